//! 🔢 Run-scoped counters — the pipeline's scoreboard.
//!
//! 🧠 Knowledge graph: ONE `PipelineCounters` per run, owned by the
//! supervisor, handed to every worker as an `Arc`. No process-wide statics,
//! no lazy globals, no "it's fine, it's just a counter" module-level state.
//! Two runs in the same process get two scoreboards. Revolutionary.
//!
//! All increments are `Relaxed` — these are tallies, not synchronization.
//! The channel and the task joins carry the actual happens-before; the
//! counters just count.

use std::sync::atomic::{AtomicU64, Ordering};

/// 🔢 The live, atomic scoreboard the workers poke at.
///
/// Clean-drain invariants (the supervisor's terminal report is where these
/// become visible):
/// - `consumed == produced` — every event put is eventually taken.
/// - `retained <= consumed` — the filter only ever shrinks the stream.
/// - committed rows `== retained - rejected_insert` — every survivor is
///   either in the sink or accounted for as a failed batch member.
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    /// 📤 Events successfully put onto the buffer by readers.
    produced: AtomicU64,
    /// 📥 Events taken off the buffer by consumers (drain markers excluded).
    consumed: AtomicU64,
    /// ⚡ Events that cleared the energy threshold and entered a batch.
    retained: AtomicU64,
    /// 💀 Lines that failed to parse. Logged, counted, forgiven.
    rejected_parse: AtomicU64,
    /// 💀 Events in batches whose commit failed. Counted by batch length.
    rejected_insert: AtomicU64,
    /// 🚦 Bounded offers that timed out before the blocking put landed —
    /// the backpressure visibility metric.
    offers_refused: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retained(&self) {
        self.retained.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parse_reject(&self) {
        self.rejected_parse.fetch_add(1, Ordering::Relaxed);
    }

    /// 💀 A whole batch went down together; count every passenger.
    pub(crate) fn record_insert_reject(&self, batch_len: u64) {
        self.rejected_insert.fetch_add(batch_len, Ordering::Relaxed);
    }

    pub(crate) fn record_offer_refused(&self) {
        self.offers_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// 📸 Freeze the scoreboard into plain integers. Taken by the supervisor
    /// after both pools have joined, so the numbers are final, not a blur.
    pub(crate) fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            retained: self.retained.load(Ordering::Relaxed),
            rejected_parse: self.rejected_parse.load(Ordering::Relaxed),
            rejected_insert: self.rejected_insert.load(Ordering::Relaxed),
            offers_refused: self.offers_refused.load(Ordering::Relaxed),
        }
    }
}

/// 📸 A frozen copy of the counters — plain `u64`s, no atomics, no surprises.
/// This is what leaves the crate inside the terminal report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub produced: u64,
    pub consumed: u64,
    pub retained: u64,
    pub rejected_parse: u64,
    pub rejected_insert: u64,
    pub offers_refused: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 🧪 Increments land where they're aimed and the snapshot is faithful.
    #[test]
    fn the_one_where_the_scoreboard_kept_score() {
        let counters = PipelineCounters::default();
        for _ in 0..5 {
            counters.record_produced();
            counters.record_consumed();
        }
        counters.record_retained();
        counters.record_retained();
        counters.record_parse_reject();
        counters.record_insert_reject(2);
        counters.record_offer_refused();

        let snap = counters.snapshot();
        assert_eq!(
            snap,
            CounterSnapshot {
                produced: 5,
                consumed: 5,
                retained: 2,
                rejected_parse: 1,
                rejected_insert: 2,
                offers_refused: 1,
            }
        );
    }

    /// 🧪 Two runs, two scoreboards. The Default impl is the whole anti-global
    /// design, so we pin it.
    #[test]
    fn the_one_where_every_run_started_from_zero() {
        let first = PipelineCounters::default();
        first.record_produced();
        let second = PipelineCounters::default();
        assert_eq!(second.snapshot(), CounterSnapshot::default());
        assert_eq!(first.snapshot().produced, 1);
    }
}
