//! 🎬 *[aerial shot: a beam dump at golden hour. two worker pools idle.]*
//! 🎬 *[voiceover, gravelly]* "They said the shutdown couldn't be clean."
//! 🎬 "They said somebody ALWAYS loses a batch."
//! 🎬 "This supervisor said: not on my join handles."
//! 🎬 *[title card slams]* 🦆
//!
//! 📦 The Supervisor module — the one component allowed to know the whole
//! lifecycle, and therefore the one component blamed for all of it. Air
//! traffic control for an airport with two runways: readers in, consumers
//! out.
//!
//! 🧠 Knowledge graph — the lifecycle, which is the actual product here:
//! ```text
//!  validate → spawn consumers → spawn readers
//!      → join READERS            (nothing can enter the buffer after this)
//!      → enqueue one Drain per consumer, close the channel
//!      → join CONSUMERS          (each flushed its residual batch)
//!      → close the sink → freeze counters → report
//! ```
//! The happens-before is structural, not hopeful: drains are enqueued only
//! after every reader has joined, so no consumer can ever observe an event
//! after its drain marker. On cancellation, pools get `abort_grace` to
//! finish their residual flushes before the supervisor reaches for
//! `AbortHandle`. It prefers not to. It will.
//!
//! ⚠️ THIS MODULE STAYS PRIVATE. THE WORKERS STAY PRIVATE-ER.
//! 🔒 Callers get `run()` and a report; the pools, the drain protocol, and
//! the abort machinery are not an API, they are a sealed blast door. 💀

mod workers;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{Sink, SinkBackend};
use crate::buffer::{self, BufferItem};
use crate::counters::PipelineCounters;
use crate::report::IngestReport;
use crate::supervisors::workers::{ConsumerWorker, ReaderWorker, Worker};

/// 📦 The Supervisor: owns the run lifecycle and nothing else.
///
/// 🏗️ The buffer, the counters, and the drain protocol are constructed,
/// sequenced, and torn down here. Workers get clones and child tokens;
/// the Supervisor keeps the originals, the sink, and the blame.
pub(crate) struct Supervisor {
    /// 🔧 The run's entire configuration, fixed at construction — the
    /// supervisor re-reads knobs, it never re-writes them.
    app_config: AppConfig,
}

impl Supervisor {
    /// 🚀 A Supervisor costs nothing until `run` — construction is just
    /// taking custody of the config.
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🧵 Run one complete ingestion: spawn, drain, account, report.
    ///
    /// Takes ownership of the sink (the supervisor closes it — consumers
    /// only borrow clones) and a cancellation token the caller may trip at
    /// any time to switch the run from "drain" to "abort".
    pub(crate) async fn run(
        &self,
        sink: SinkBackend,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let runtime = &self.app_config.runtime;
        // 🔒 ConfigurationError lives and dies HERE — nothing spawns until
        // the knobs make sense.
        runtime.validate()?;

        let counters = Arc::new(PipelineCounters::default());
        let (tx, rx) = buffer::bounded(runtime.buffer_capacity);
        let started = Instant::now();

        // 📥 Consumers first — the dock crew clocks in before the trucks roll.
        let mut consumer_handles = Vec::with_capacity(runtime.consumer_count);
        for worker_id in 0..runtime.consumer_count {
            let worker = ConsumerWorker::new(
                worker_id,
                rx.clone(),
                sink.clone(),
                counters.clone(),
                cancel.child_token(),
                runtime.energy_threshold,
                runtime.batch_size,
                runtime.take_timeout(),
            );
            consumer_handles.push(worker.start());
        }
        // 🗑️ the supervisor's own receiver served its purpose (being cloned)
        drop(rx);

        // 📖 Readers next — the input list dealt out round-robin, whole
        // files only. A file is never split; per-input ordering is sacred.
        let assignments = distribute_inputs(&self.app_config.inputs, runtime.producer_count);
        let mut reader_handles = Vec::with_capacity(assignments.len());
        for (worker_id, inputs) in assignments.into_iter().enumerate() {
            let worker = ReaderWorker::new(
                worker_id,
                inputs,
                tx.clone(),
                counters.clone(),
                cancel.child_token(),
                runtime.offer_timeout(),
            );
            reader_handles.push(worker.start());
        }

        info!(
            "🚀 pipeline running — {} reader(s), {} consumer(s), buffer capacity {}",
            reader_handles.len(),
            runtime.consumer_count,
            runtime.buffer_capacity
        );

        // ⏳ Step one of the drain: wait out the readers. After this line,
        // NOTHING new can enter the buffer — tx lives only in our hands.
        let reader_results = join_pool("reader", reader_handles, &cancel, runtime).await;
        let failed_readers = tally_pool("reader", reader_results);

        // 🏁 Step two: one drain marker per consumer, blocking puts, then
        // close the channel so stragglers see Closed instead of silence.
        // Skipped on the abort path — cancellation already reaches everyone.
        if !cancel.is_cancelled() {
            for _ in 0..runtime.consumer_count {
                if tx.send(BufferItem::Drain).await.is_err() {
                    // 💀 all consumers already gone; no one left to notify
                    break;
                }
            }
        }
        tx.close();
        drop(tx);

        // ⏳ Step three: wait out the consumers — every one of them flushes
        // its residual batch on the way through its exit door.
        let consumer_results = join_pool("consumer", consumer_handles, &cancel, runtime).await;
        let failed_consumers = tally_pool("consumer", consumer_results);

        // 🗑️ The sink closes exactly once, here, after its last customer left.
        sink.close()
            .await
            .context("💀 Supervisor failed to close the sink — the data is in, but the goodbye didn't take")?;

        let report = IngestReport::new(started.elapsed(), counters.snapshot());
        if failed_readers > 0 || failed_consumers > 0 {
            warn!(
                "⚠️ run finished degraded — {} reader(s) and {} consumer(s) failed; the counters hold the receipts",
                failed_readers, failed_consumers
            );
        }
        info!(
            "📊 ingest report — throughput {:.0} events/s\n{}",
            report.events_per_sec(),
            report
        );
        Ok(report)
    }
}

/// 🃏 Deal the input files across the reader pool, round-robin, whole files
/// only. Fewer inputs than lanes? The extra lanes are simply never dealt —
/// we don't spawn readers to stare at empty Vecs.
fn distribute_inputs(inputs: &[String], producer_count: usize) -> Vec<Vec<String>> {
    let lane_count = producer_count.min(inputs.len());
    let mut lanes: Vec<Vec<String>> = vec![Vec::new(); lane_count];
    for (index, input) in inputs.iter().enumerate() {
        lanes[index % lane_count].push(input.clone());
    }
    lanes
}

/// ⏳ Join one worker pool, with manners and a deadline.
///
/// Drain path: plain `join_all`, wait as long as it takes. If cancellation
/// fires (before or during), the pool gets `abort_grace` to come home on
/// its own — residual flushes happen in that window — and then the
/// stragglers meet `AbortHandle`. The handles are ALWAYS awaited to
/// completion afterwards, so nothing is left running behind our back.
async fn join_pool(
    label: &str,
    handles: Vec<JoinHandle<Result<()>>>,
    cancel: &CancellationToken,
    runtime: &crate::app_config::RuntimeConfig,
) -> Vec<std::result::Result<Result<()>, tokio::task::JoinError>> {
    if handles.is_empty() {
        return Vec::new();
    }

    // 🪝 keep abort handles — join_all is about to consume the real ones
    let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let mut all = join_all(handles);

    tokio::select! {
        results = &mut all => results,
        _ = cancel.cancelled() => {
            // 🛑 abort path: a bounded grace period, then force.
            match tokio::time::timeout(runtime.abort_grace(), &mut all).await {
                Ok(results) => results,
                Err(_elapsed) => {
                    warn!(
                        "⏰ {} pool blew through the {}ms grace period — force-aborting the stragglers",
                        label,
                        runtime.abort_grace().as_millis()
                    );
                    for abort in &abort_handles {
                        abort.abort();
                    }
                    // ✅ aborted tasks resolve promptly as JoinError::cancelled
                    all.await
                }
            }
        }
    }
}

/// 🧾 Log a pool's results and count the casualties. A failed worker is a
/// log line and a number, never a run-ending event — fault isolation is
/// the contract, and the terminal report carries the aggregate truth.
fn tally_pool(
    label: &str,
    results: Vec<std::result::Result<Result<()>, tokio::task::JoinError>>,
) -> usize {
    let mut failures = 0;
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(worker_err)) => {
                failures += 1;
                // 💀 the worker returned its own obituary — print the chain
                error!("💀 a {} worker failed: {:#}", label, worker_err);
            }
            Err(join_err) if join_err.is_cancelled() => {
                failures += 1;
                warn!("⏰ a {} worker was force-aborted past the grace period", label);
            }
            Err(join_err) => {
                failures += 1;
                error!("💀 a {} worker panicked: {}", label, join_err);
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::app_config::RuntimeConfig;

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// 🧪 Round-robin dealing: whole files, fair lanes, stable order within
    /// a lane (which is what keeps per-input FIFO meaningful).
    #[test]
    fn the_one_where_the_cards_were_dealt_fairly() {
        let dealt = distribute_inputs(&inputs(&["a", "b", "c", "d", "e"]), 2);
        assert_eq!(dealt.len(), 2);
        assert_eq!(dealt[0], inputs(&["a", "c", "e"]));
        assert_eq!(dealt[1], inputs(&["b", "d"]));
    }

    /// 🧪 More lanes than files: nobody gets an empty assignment, and one
    /// file is never split across two readers. House rules.
    #[test]
    fn the_one_where_extra_readers_were_not_invited() {
        let dealt = distribute_inputs(&inputs(&["only.csv"]), 4);
        assert_eq!(dealt.len(), 1);
        assert_eq!(dealt[0], inputs(&["only.csv"]));

        // 💤 zero inputs, zero lanes, zero fuss
        assert!(distribute_inputs(&[], 4).is_empty());
    }

    /// 🧪 The force-abort arm, exercised for real: a worker that never looks
    /// at the cancellation token blows through the grace period, meets its
    /// `AbortHandle`, and its handle is STILL awaited to a proper
    /// `JoinError` — force-aborted, not leaked, and booked as a casualty.
    #[tokio::test]
    async fn the_one_where_the_straggler_met_the_abort_handle() {
        let runtime = RuntimeConfig {
            abort_grace_ms: 50,
            ..RuntimeConfig::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        // 🧟 a worker with no manners: ignores the token entirely and naps
        // for far longer than any grace period on offer
        let straggler: JoinHandle<Result<()>> = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        });

        let results = join_pool("straggler", vec![straggler], &cancel, &runtime).await;
        assert_eq!(results.len(), 1, "the aborted handle must still be awaited");
        match &results[0] {
            Err(join_err) => assert!(
                join_err.is_cancelled(),
                "the straggler must end as a forced abort, not a panic"
            ),
            unexpectedly_polite => {
                panic!("expected a forced abort, got {unexpectedly_polite:?}")
            }
        }

        // 🧾 and the tally books exactly one casualty for the report
        assert_eq!(tally_pool("straggler", results), 1);
    }
}
