//! 💥 cdx — the core library: collision events go in as text lines and
//! come out as database rows, or as an honest entry in a rejection
//! counter. There is no third option. That's the entire warranty.
//!
//! 📦 Inside: the supervisor, both worker pools, the parser, the bounded
//! buffer, and the accounting that turns "every accepted record is
//! persisted or accounted for" from a slogan into a checked invariant. 🦆
//!
//! 🧠 Knowledge graph — the whole pipeline on one line:
//! ```text
//! files → ReaderWorkers → parse → buffer(BufferItem) → ConsumerWorkers → filter → batch → Sink
//! ```
//! Control flow is the supervisor's whole personality: readers join, drain
//! markers go in-band, consumers flush and exit, the report tells the truth.
//!
//! ⚠️ Version 0.1.0, and planning to stay humble about it for a while.

// -- 🗑️ blanket allows while the crate settles; tighten before calling this "done"
#![allow(dead_code, unused_variables, unused_imports)]
pub mod app_config;
pub(crate) mod backends;
pub(crate) mod buffer;
pub(crate) mod counters;
pub mod event;
pub mod parser;
pub(crate) mod progress;
pub mod report;
mod supervisors;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app_config::{AppConfig, SinkConfig};
use crate::backends::SinkBackend;
use crate::backends::in_mem::InMemorySink;
use crate::backends::postgres::PostgresSink;
use crate::supervisors::Supervisor;

pub use crate::counters::CounterSnapshot;
pub use crate::report::IngestReport;

/// 🚀 The front door: config in, terminal report out.
///
/// Builds the sink from config, runs one complete ingestion, and returns
/// the terminal report. Cancellation-free variant — for callers who want a
/// Ctrl-C story, see [`run_with_shutdown`].
pub async fn run(app_config: AppConfig) -> Result<IngestReport> {
    run_with_shutdown(app_config, CancellationToken::new()).await
}

/// 🚀 Like [`run`], but the caller holds the other end of the kill switch.
///
/// Trip the token at any time and the run flips from the drain path to the
/// abort path: workers get the configured grace period to flush their
/// residual batches, then the supervisor stops asking nicely.
pub async fn run_with_shutdown(
    app_config: AppConfig,
    cancel: CancellationToken,
) -> Result<IngestReport> {
    info!("💥 collidr spinning up the beamline — let's see what the detectors caught");

    // Build the sink from config — explicitly, once, here. The supervisor
    // receives ownership and closes it when the run ends. There is no
    // "get instance" anywhere in this crate and there never will be.
    let sink_backend = from_sink_config(&app_config)
        .await
        .context("Failed to create sink backend")?;

    let supervisor = Supervisor::new(app_config);
    let report = supervisor.run(sink_backend, cancel).await?;

    info!(
        "🎉 ingest finished in {:?} — every event persisted or accounted for; the report above holds the receipts 🦆",
        report.elapsed
    );
    Ok(report)
}

async fn from_sink_config(config: &AppConfig) -> Result<SinkBackend> {
    match &config.sink_config {
        // -- 🐘 The Postgres arm: connections, transactions, and the quiet
        // -- confidence of a database that has outlived every framework
        // -- that ever condescended to it.
        SinkConfig::Postgres(pg_cfg) => {
            let sink = PostgresSink::new(pg_cfg.clone()).await?;
            Ok(SinkBackend::Postgres(sink))
        }
        // -- 🧠 The InMemory arm: a BTreeMap cosplaying as a database.
        // -- Perfect recall, zero durability, gone at process exit like it
        // -- was never here.
        SinkConfig::InMemory => {
            let sink = InMemorySink::new().await?;
            Ok(SinkBackend::InMemory(sink))
        }
    }
}
