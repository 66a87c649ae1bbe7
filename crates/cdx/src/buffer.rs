//! 📬 The buffer — one bounded channel to rule the whole pipeline.
//!
//! 🧠 Knowledge graph: readers `put`, consumers `take`, and the only thing
//! standing between them is an `async_channel::bounded` of [`BufferItem`].
//! Capacity is fixed at construction. Backpressure is the ENTIRE overload
//! policy — we never drop, never resize, never spill to disk. When the
//! buffer is full, producers wait. That's it. That's the algorithm.
//!
//! Termination travels in-band: the supervisor enqueues one
//! [`BufferItem::Drain`] per consumer AFTER every reader has joined, so a
//! `Drain` can never overtake a real event on the same lane. FIFO does the
//! ordering work; we just don't cheat around it with a side channel.
//!
//! "He who adds an out-of-band control channel, debugs two orderings." 📜

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::event::CollisionEvent;

/// 📦 What actually rides the channel: a collision event, or the polite
/// in-band "we're done here" marker.
///
/// The `Drain` variant replaces the reserved-value sentinel record of less
/// enlightened pipelines. No magic energies, no all-zero ids doubling as
/// control flow — the compiler can see the difference between data and
/// shutdown, and so can you at 3am.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BufferItem {
    /// ⚡ One parsed collision event, en route to the filter.
    Event(CollisionEvent),
    /// 🏁 Shutdown marker. One per consumer, enqueued only after all readers
    /// have finished. Never persisted. Never counted. Never sad about it.
    Drain,
}

/// ✉️ Producer end of the buffer.
pub(crate) type ItemSender = async_channel::Sender<BufferItem>;
/// 📥 Consumer end of the buffer.
pub(crate) type ItemReceiver = async_channel::Receiver<BufferItem>;

/// 🏗️ Build the bounded handoff. `capacity` comes straight from config and
/// has already been validated positive — the supervisor does not launch
/// workers against a zero-width mail slot.
pub(crate) fn bounded(capacity: usize) -> (ItemSender, ItemReceiver) {
    async_channel::bounded(capacity)
}

/// 🚦 What happened when a reader tried to put an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PutOutcome {
    /// ✅ Delivered. `refused_first` is true when the bounded offer timed out
    /// and we had to fall back to the unconditional blocking put — that's the
    /// backpressure signal the metrics want to see.
    Sent { refused_first: bool },
    /// 🛑 Cancellation fired mid-put. The item was not delivered; the caller
    /// should stop reading and go home.
    Cancelled,
    /// 💀 The channel is closed. Should not happen while readers live — the
    /// supervisor holds the lifecycle — but we refuse to pretend otherwise.
    Closed,
}

/// 📤 The two-step put: bounded offer first, unconditional blocking put second.
///
/// Step 1 gives the buffer `offer_timeout` to make room. If it can't, we
/// record the refusal (via the return value — the buffer itself keeps no
/// metrics, it's a channel, not a dashboard) and fall through to step 2,
/// a blocking put that only cancellation can interrupt.
///
/// ⚠️ `BufferItem` is `Copy`, which is what makes the timed-out offer safe:
/// the send future that expired owned a copy, and dropping an un-sent
/// `async_channel` send future never half-delivers. The original item is
/// still in hand for the blocking retry. No loss, no duplication.
pub(crate) async fn put_with_backpressure(
    tx: &ItemSender,
    item: BufferItem,
    offer_timeout: Duration,
    cancel: &CancellationToken,
) -> PutOutcome {
    // 🚪 Step 1: the bounded offer. Knock politely for a while.
    match timeout(offer_timeout, tx.send(item)).await {
        Ok(Ok(())) => return PutOutcome::Sent { refused_first: false },
        Ok(Err(_)) => return PutOutcome::Closed,
        Err(_elapsed) => {
            // -- 🚦 full house. the refusal is the caller's metric to record.
        }
    }

    // 🚪 Step 2: the unconditional blocking put. We WILL wait — progress is
    // guaranteed — unless the run is being cancelled out from under us.
    tokio::select! {
        _ = cancel.cancelled() => PutOutcome::Cancelled,
        sent = tx.send(item) => match sent {
            Ok(()) => PutOutcome::Sent { refused_first: true },
            Err(_) => PutOutcome::Closed,
        },
    }
}

/// 🚦 What happened when a consumer tried to take an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TakeOutcome {
    /// 📦 Got one. Might be an event, might be the drain marker.
    Item(BufferItem),
    /// ⏱️ Nothing arrived within the deadline. The caller re-checks its
    /// shutdown signals and spins the loop again.
    TimedOut,
    /// 🏁 Channel closed and empty. Equivalent to a drain marker for anyone
    /// still listening.
    Closed,
    /// 🛑 Cancellation fired mid-take.
    Cancelled,
}

/// 📥 Bounded take: wait up to `take_timeout` for an item, racing
/// cancellation the whole time. The deadline exists so a consumer parked on
/// an empty buffer stays responsive to shutdown instead of meditating
/// forever on a channel nobody writes to anymore.
pub(crate) async fn take_with_deadline(
    rx: &ItemReceiver,
    take_timeout: Duration,
    cancel: &CancellationToken,
) -> TakeOutcome {
    tokio::select! {
        _ = cancel.cancelled() => TakeOutcome::Cancelled,
        received = timeout(take_timeout, rx.recv()) => match received {
            Ok(Ok(item)) => TakeOutcome::Item(item),
            Ok(Err(_)) => TakeOutcome::Closed,
            Err(_elapsed) => TakeOutcome::TimedOut,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::event::ParticleKind;

    fn event_with_energy(energy_gev: f64) -> CollisionEvent {
        CollisionEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            energy_gev,
            kind: ParticleKind::Proton,
            detected: true,
        }
    }

    /// 🧪 One producer's puts come out in the order they went in, and the
    /// drain marker enqueued last comes out last. FIFO is not optional.
    #[tokio::test]
    async fn the_one_where_fifo_meant_first_in_first_out_no_really() {
        let (tx, rx) = bounded(16);
        let cancel = CancellationToken::new();

        let energies = [1.0, 2.0, 3.0, 4.0, 5.0];
        for energy in energies {
            let outcome = put_with_backpressure(
                &tx,
                BufferItem::Event(event_with_energy(energy)),
                Duration::from_millis(100),
                &cancel,
            )
            .await;
            assert_eq!(outcome, PutOutcome::Sent { refused_first: false });
        }
        tx.send(BufferItem::Drain).await.unwrap();

        for expected in energies {
            match take_with_deadline(&rx, Duration::from_millis(100), &cancel).await {
                TakeOutcome::Item(BufferItem::Event(event)) => {
                    assert_eq!(event.energy_gev, expected)
                }
                other => panic!("expected an event, got {other:?}"),
            }
        }
        // 🏁 and the marker brings up the rear, as the protocol demands
        assert_eq!(
            take_with_deadline(&rx, Duration::from_millis(100), &cancel).await,
            TakeOutcome::Item(BufferItem::Drain)
        );
    }

    /// 🧪 A full buffer refuses the bounded offer, records the refusal, and
    /// still delivers once a consumer makes room. Backpressure, not loss.
    #[tokio::test]
    async fn the_one_where_the_buffer_said_not_yet_but_never_said_no() {
        let (tx, rx) = bounded(1);
        let cancel = CancellationToken::new();

        tx.send(BufferItem::Event(event_with_energy(1.0)))
            .await
            .unwrap();

        // 📥 a slow consumer that frees the single slot after a beat
        let drain_rx = rx.clone();
        let drainer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drain_rx.recv().await.unwrap()
        });

        // 🚦 the offer times out (10ms against a 50ms nap), then the blocking
        // put lands once the drainer does its job
        let outcome = put_with_backpressure(
            &tx,
            BufferItem::Event(event_with_energy(2.0)),
            Duration::from_millis(10),
            &cancel,
        )
        .await;
        assert_eq!(outcome, PutOutcome::Sent { refused_first: true });

        drainer.await.unwrap();
        match take_with_deadline(&rx, Duration::from_millis(100), &cancel).await {
            TakeOutcome::Item(BufferItem::Event(event)) => assert_eq!(event.energy_gev, 2.0),
            other => panic!("expected the second event, got {other:?}"),
        }
    }

    /// 🧪 Capacity is a hard ceiling: the channel simply
    /// cannot hold more than it was built for.
    #[test]
    fn the_one_where_the_room_had_a_fire_code() {
        let (tx, _rx) = bounded(2);
        assert!(tx.try_send(BufferItem::Drain).is_ok());
        assert!(tx.try_send(BufferItem::Drain).is_ok());
        // 🚫 third item bounces off the capacity limit
        assert!(tx.try_send(BufferItem::Drain).is_err());
        assert_eq!(tx.len(), 2);
    }

    /// 🧪 Cancellation interrupts a blocked put promptly. The item is simply
    /// not delivered — the reader's cue to pack up mid-file.
    #[tokio::test]
    async fn the_one_where_cancellation_cut_the_line_politely() {
        let (tx, _rx) = bounded(1);
        let cancel = CancellationToken::new();
        tx.send(BufferItem::Drain).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = put_with_backpressure(
            &tx,
            BufferItem::Event(event_with_energy(9.0)),
            Duration::from_millis(5),
            &cancel,
        )
        .await;
        assert_eq!(outcome, PutOutcome::Cancelled);
    }

    /// 🧪 An empty, closed channel reads as Closed; an empty, open channel
    /// reads as TimedOut. Consumers tell these apart on purpose.
    #[tokio::test]
    async fn the_one_where_closed_and_quiet_were_different_kinds_of_silence() {
        let cancel = CancellationToken::new();

        let (tx, rx) = bounded(4);
        assert_eq!(
            take_with_deadline(&rx, Duration::from_millis(10), &cancel).await,
            TakeOutcome::TimedOut
        );

        tx.close();
        assert_eq!(
            take_with_deadline(&rx, Duration::from_millis(10), &cancel).await,
            TakeOutcome::Closed
        );
    }
}
