//! 🎬 *[night shift at the loading dock. the buffer hums. somewhere past
//! the far wall, a database clears its throat.]*
//!
//! 🗑️ The ConsumerWorker module — take, filter, batch, commit, repeat.
//!
//! It takes events off the buffer with a bounded wait, drops the ones that
//! can't clear the energy threshold, accumulates survivors into a local
//! batch, and commits full batches through the Sink in one transaction each.
//!
//! 🧠 Knowledge graph: the ConsumerWorker is the bridge between the raw
//! event stream and the sink's transactional I/O:
//! - **Filter**: `energy > threshold`, strictly greater — a discard, not an error
//! - **Batch**: local Vec, capacity `batch_size`, owned by exactly one worker
//! - **Sink**: one `insert_batch` per flush; all-or-nothing per call
//!
//! ```text
//!   buffer(BufferItem) → filter → batch Vec → sink.insert_batch(batch)
//! ```
//!
//! Exit doors, all of which pass through the residual flush on the way out:
//! a `Drain` marker, a closed channel, or cancellation. A partial batch
//! NEVER outlives its worker. That's the whole residual-flush covenant.
//!
//! ⚠️ This loop has four exits and exactly one habit: whichever door it
//! leaves through, the residual flush is already standing in front of it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::buffer::{self, BufferItem, ItemReceiver, TakeOutcome};
use crate::counters::PipelineCounters;
use crate::event::CollisionEvent;

/// 🗑️ The ConsumerWorker: drains the shared buffer into the sink, one
/// threshold-filtered batch at a time.
///
/// Holds its own receiver clone, its own sink handle, and its own batch
/// Vec. The batch is the ONLY buffered state in the whole consumer — lose
/// the worker, and the exit path has already flushed it.
#[derive(Debug)]
pub(crate) struct ConsumerWorker {
    /// 🔢 Which lane of the consumer pool this is — for log lines only.
    worker_id: usize,
    /// 📥 Consumer end of the shared buffer.
    rx: ItemReceiver,
    /// 🕳️ This worker's handle on the sink (pool clone / Arc clone).
    sink: SinkBackend,
    /// 🔢 The run's shared scoreboard.
    counters: Arc<PipelineCounters>,
    /// 🛑 Cooperative cancellation — consulted on every take.
    cancel: CancellationToken,
    /// ⚡ The retention bar. Strictly greater-than. 50.0 GeV means 50.0 stays out.
    threshold: f64,
    /// 📦 Flush the batch at this many survivors.
    batch_size: usize,
    /// ⏱️ Bounded take — how long to nap on an empty buffer before
    /// re-checking the shutdown signals.
    take_timeout: Duration,
}

impl ConsumerWorker {
    /// 🏗️ Constructs a new ConsumerWorker with receiver, sink, counters, and knobs.
    ///
    /// The threshold decides WHO gets persisted (strictly above the bar)
    /// The batch size decides HOW MANY travel together (one transaction each)
    /// The take timeout decides HOW OFTEN an idle worker looks up from its desk
    /// The worker decides WHEN — and "when" is a full batch or an exit
    /// door, nothing else. 🦆
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        worker_id: usize,
        rx: ItemReceiver,
        sink: SinkBackend,
        counters: Arc<PipelineCounters>,
        cancel: CancellationToken,
        threshold: f64,
        batch_size: usize,
        take_timeout: Duration,
    ) -> Self {
        Self {
            worker_id,
            rx,
            sink,
            counters,
            cancel,
            threshold,
            batch_size,
            take_timeout,
        }
    }

    /// 🔄 The consumer's whole life: take → filter → batch → flush, until a
    /// shutdown signal, then one last residual flush on the way out.
    async fn run(self) -> Result<()> {
        // 📦 The batch — accumulates threshold survivors until flush
        let mut batch: Vec<CollisionEvent> = Vec::with_capacity(self.batch_size);

        loop {
            match buffer::take_with_deadline(&self.rx, self.take_timeout, &self.cancel).await {
                TakeOutcome::Item(BufferItem::Event(event)) => {
                    self.counters.record_consumed();

                    // ⚡ The bar is strict: exactly-threshold does not clear it.
                    // Failing the filter is a discard, not an error — nobody
                    // counts the events that simply weren't interesting.
                    if event.energy_gev > self.threshold {
                        self.counters.record_retained();
                        batch.push(event);

                        if batch.len() >= self.batch_size {
                            debug!(
                                "🚿 consumer {} flushing {} events — batch is full",
                                self.worker_id,
                                batch.len()
                            );
                            flush_batch(&mut batch, &self.sink, &self.counters, self.worker_id)
                                .await;
                        }
                    }
                }
                TakeOutcome::Item(BufferItem::Drain) => {
                    // 🏁 the in-band goodbye: readers are all done and the
                    // supervisor dealt this worker its personal drain marker
                    debug!("🏁 consumer {} received its drain marker", self.worker_id);
                    break;
                }
                TakeOutcome::Closed => {
                    // 🏁 channel closed and empty — same meaning as a drain
                    // marker for anyone who missed theirs
                    debug!("🏁 consumer {} found the channel closed", self.worker_id);
                    break;
                }
                TakeOutcome::Cancelled => {
                    // 🛑 abort path — still exits THROUGH the residual flush
                    debug!("🛑 consumer {} cancelled mid-take", self.worker_id);
                    break;
                }
                TakeOutcome::TimedOut => {
                    // ⏱️ nothing arrived; double-check the shutdown signal and
                    // go around again. Patience is a worker virtue.
                    if self.cancel.is_cancelled() {
                        debug!("🛑 consumer {} noticed cancellation on timeout", self.worker_id);
                        break;
                    }
                }
            }
        }

        // 🚿 The residual flush: a partial batch never outlives its worker.
        if !batch.is_empty() {
            debug!(
                "🚿 consumer {} final flush: {} events — exiting with a clean desk",
                self.worker_id,
                batch.len()
            );
        }
        flush_batch(&mut batch, &self.sink, &self.counters, self.worker_id).await;
        debug!("🏁 consumer {} clocking out — batch empty, books balanced", self.worker_id);
        Ok(())
    }
}

impl Worker for ConsumerWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 consumer {} on shift — the buffer's that way, the sink's this way", self.worker_id);
            self.run().await
        })
    }
}

/// 🚿 Flush the batch: commit → count → clear.
///
/// Extracted as a function because the ConsumerWorker flushes from two places:
/// 1. When the batch reaches `batch_size`
/// 2. On the way out (drain marker, closed channel, or cancellation)
///
/// A failed commit is counted (the WHOLE batch lands in `rejected_insert`),
/// logged at error level, and survived — the consumer moves on to its next
/// batch, because one refused transaction does not get to end a run. The
/// batch is cleared either way; there is no retry in the core and no
/// half-remembered batch haunting the next flush.
///
/// Ancient proverb: the full batch and the exit door must leave through the
/// same pipe, or the books learn to disagree. 💀
async fn flush_batch(
    batch: &mut Vec<CollisionEvent>,
    sink: &SinkBackend,
    counters: &PipelineCounters,
    worker_id: usize,
) {
    if batch.is_empty() {
        return;
    }

    match sink.insert_batch(batch).await {
        Ok(inserted) => {
            debug!(
                "✅ consumer {} committed {} events ({} new rows, the rest déjà vu)",
                worker_id,
                batch.len(),
                inserted
            );
        }
        Err(err) => {
            // 💀 the transaction died as it lived: atomically. Every event in
            // the batch is now a rejected_insert statistic, and the terminal
            // report will tell on us. That's the design — loud accounting
            // over quiet loss.
            counters.record_insert_reject(batch.len() as u64);
            error!(
                "💀 consumer {} failed to commit a batch of {}: {:#} — counted, logged, continuing",
                worker_id,
                batch.len(),
                err
            );
        }
    }

    // 🧹 Reset batch state
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::backends::in_mem::InMemorySink;
    use crate::buffer::ItemSender;
    use crate::event::ParticleKind;

    fn event_with_energy(energy_gev: f64) -> CollisionEvent {
        CollisionEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            energy_gev,
            kind: ParticleKind::Muon,
            detected: true,
        }
    }

    fn consumer_for(
        rx: ItemReceiver,
        sink: InMemorySink,
        counters: Arc<PipelineCounters>,
        batch_size: usize,
    ) -> ConsumerWorker {
        ConsumerWorker::new(
            0,
            rx,
            SinkBackend::InMemory(sink),
            counters,
            CancellationToken::new(),
            50.0,
            batch_size,
            Duration::from_millis(200),
        )
    }

    async fn send_events(tx: &ItemSender, energies: &[f64]) {
        for &energy in energies {
            tx.send(BufferItem::Event(event_with_energy(energy)))
                .await
                .unwrap();
        }
        tx.send(BufferItem::Drain).await.unwrap();
    }

    /// 🧪 The filter is strict: above the bar stays, at the bar leaves, and
    /// neither discard nor retention miscounts anything.
    #[tokio::test]
    async fn the_one_where_exactly_fifty_gev_was_shown_the_door() {
        let (tx, rx) = buffer::bounded(16);
        let sink = InMemorySink::new().await.unwrap();
        let counters = Arc::new(PipelineCounters::default());

        send_events(&tx, &[49.9, 50.0, 50.1, 120.0]).await;
        consumer_for(rx, sink.clone(), counters.clone(), 100)
            .start()
            .await
            .expect("join")
            .expect("consumer result");

        let snap = counters.snapshot();
        assert_eq!(snap.consumed, 4);
        assert_eq!(snap.retained, 2);
        assert_eq!(snap.rejected_insert, 0);
        assert_eq!(sink.rows.lock().await.len(), 2);
        // 🚿 one residual flush of the two survivors
        assert_eq!(*sink.commits.lock().await, vec![2]);
    }

    /// 🧪 Batch boundary: batch_size survivors trigger a full-batch commit,
    /// the +1 straggler rides the residual flush. Two commits, sizes [N, 1].
    #[tokio::test]
    async fn the_one_where_the_batch_overflowed_by_exactly_one() {
        let (tx, rx) = buffer::bounded(16);
        let sink = InMemorySink::new().await.unwrap();
        let counters = Arc::new(PipelineCounters::default());

        send_events(&tx, &[100.0, 100.0, 100.0, 100.0]).await;
        consumer_for(rx, sink.clone(), counters.clone(), 3)
            .start()
            .await
            .expect("join")
            .expect("consumer result");

        assert_eq!(counters.snapshot().retained, 4);
        assert_eq!(*sink.commits.lock().await, vec![3, 1]);
    }

    /// 🧪 A failing sink costs the batch, not the worker: the commit error
    /// is counted at batch length and the consumer still drains to the end.
    #[tokio::test]
    async fn the_one_where_the_commit_failed_and_the_books_stayed_honest() {
        let (tx, rx) = buffer::bounded(16);
        let sink = InMemorySink::new().await.unwrap();
        sink.poison();
        let counters = Arc::new(PipelineCounters::default());

        send_events(&tx, &[60.0, 70.0, 80.0]).await;
        consumer_for(rx, sink.clone(), counters.clone(), 2)
            .start()
            .await
            .expect("join")
            .expect("consumer survives commit failures");

        let snap = counters.snapshot();
        assert_eq!(snap.retained, 3);
        // 💀 full batch of 2, then residual of 1 — both refused, all counted
        assert_eq!(snap.rejected_insert, 3);
        assert!(sink.rows.lock().await.is_empty());
    }

    /// 🧪 Cancellation liveness + residual covenant: a cancelled consumer
    /// exits promptly AND its partial batch hits the sink on the way out.
    #[tokio::test]
    async fn the_one_where_the_fire_alarm_rang_and_the_desk_was_still_cleaned() {
        let (tx, rx) = buffer::bounded(16);
        let sink = InMemorySink::new().await.unwrap();
        let counters = Arc::new(PipelineCounters::default());
        let cancel = CancellationToken::new();

        // two survivors, but NO drain marker — only cancellation ends this run
        tx.send(BufferItem::Event(event_with_energy(77.0)))
            .await
            .unwrap();
        tx.send(BufferItem::Event(event_with_energy(88.0)))
            .await
            .unwrap();

        let worker = ConsumerWorker::new(
            0,
            rx,
            SinkBackend::InMemory(sink.clone()),
            counters.clone(),
            cancel.clone(),
            50.0,
            100,
            Duration::from_millis(50),
        );
        let handle = worker.start();

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        handle.await.expect("join").expect("consumer result");

        // 🚿 residual flush happened despite the abort path
        assert_eq!(*sink.commits.lock().await, vec![2]);
        assert_eq!(sink.rows.lock().await.len(), 2);
    }
}
