//! 📖 The ReaderWorker — it opens a file and then tells the truth about
//! every line in it: event, reject, blank, or header. Repeat until EOF,
//! until cancellation, or until the filesystem stops returning its calls.
//!
//! 🧠 Knowledge graph: one reader owns a LIST of whole input files — the
//! supervisor deals them out round-robin and never splits a file across
//! readers, so within any one input the buffer sees strict file order.
//! Across readers? No promises. Never were. Never will be. Tests that
//! assume cross-file ordering get what they deserve.
//!
//! Per line, the flow is: skip blanks → maybe skip the header → parse →
//! two-step put (bounded offer, then blocking put). Parse failures are a
//! `warn!` and a counter bump. I/O failures kill THIS reader and nobody
//! else — the rest of the pipeline keeps breathing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{self, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Worker;
use crate::buffer::{self, BufferItem, ItemSender, PutOutcome};
use crate::counters::PipelineCounters;
use crate::event::CollisionEvent;
use crate::parser::{self, ParseError};
use crate::progress::ProgressMetrics;

/// 📖 Reads input files line by line, parses, and feeds the buffer.
///
/// Owns its input handles for the duration of the run; borrows (via `Arc`
/// and clones) the buffer, the counters, and its slice of the cancellation
/// tree. The borrow checker approved this arrangement. It did not approve
/// quickly.
#[derive(Debug)]
pub(crate) struct ReaderWorker {
    /// 🔢 Which lane of the reader pool this is — for log lines only.
    worker_id: usize,
    /// 📂 The files this reader is responsible for, whole and in order.
    inputs: Vec<String>,
    /// ✉️ Producer end of the shared buffer.
    tx: ItemSender,
    /// 🔢 The run's shared scoreboard.
    counters: Arc<PipelineCounters>,
    /// 🛑 Cooperative cancellation — checked at every blocking edge.
    cancel: CancellationToken,
    /// ⏱️ How long the bounded offer knocks before the blocking put barges in.
    offer_timeout: Duration,
}

impl ReaderWorker {
    pub(crate) fn new(
        worker_id: usize,
        inputs: Vec<String>,
        tx: ItemSender,
        counters: Arc<PipelineCounters>,
        cancel: CancellationToken,
        offer_timeout: Duration,
    ) -> Self {
        Self {
            worker_id,
            inputs,
            tx,
            counters,
            cancel,
            offer_timeout,
        }
    }

    /// 🔄 The reader's whole life: each assigned file, front to back.
    ///
    /// An I/O error on any file ends THIS reader with an error — per-reader
    /// fatality is the contract; the supervisor logs it and the other
    /// readers keep pouring. A cancellation ends it quietly mid-file.
    async fn run(self) -> Result<()> {
        for path in &self.inputs {
            if self.cancel.is_cancelled() {
                debug!("🛑 reader {} cancelled between files", self.worker_id);
                return Ok(());
            }
            self.read_input(path).await.with_context(|| {
                format!(
                    "💀 reader {} went down reading '{}' — its remaining files die with it; every other worker soldiers on",
                    self.worker_id, path
                )
            })?;
        }
        debug!("🏁 reader {} finished its files — clocking out", self.worker_id);
        Ok(())
    }

    /// 📖 Stream one file through the parser and into the buffer.
    ///
    /// Line-oriented, buffered, never materialises the file. The first
    /// NON-EMPTY line gets one chance to be the canonical header, in which
    /// case it is discarded without ceremony or counting.
    async fn read_input(&self, path: &str) -> Result<()> {
        // -- 💀 failure to open is this reader's whole obituary — say the
        // -- useful things in it.
        let file = File::open(path).await.context(format!(
            "💀 Could not open '{}'. Missing file, wrong permissions, or a path that made \
            sense on somebody else's machine — either way this reader can't start, and it \
            won't pretend otherwise.",
            path
        ))?;

        // 📏 file size feeds the progress bar; a failed metadata call just
        // means the bar never claims a percentage (0 = unknown).
        let file_size = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        let mut progress = ProgressMetrics::new(path.to_string(), file_size);

        let mut lines = io::BufReader::new(file).lines();
        let mut seen_payload = false;

        loop {
            if self.cancel.is_cancelled() {
                // 🛑 stop promptly, mid-file — the handle drops right here
                debug!("🛑 reader {} cancelled mid-file in '{}'", self.worker_id, path);
                return Ok(());
            }

            let Some(line) = lines
                .next_line()
                .await
                .context("💀 the stream gave out mid-read — disk, network mount, or gremlins")?
            else {
                break;
            };

            // 📏 +1 for the newline the reader ate on our behalf
            let line_bytes = line.len() as u64 + 1;
            // 🧹 tolerate CRLF files without letting '\r' poison the last field
            let logical = line.trim_end_matches('\r');

            if logical.trim().is_empty() {
                // 💤 blank line: skipped, unlogged, uncounted — not even Empty
                // makes it to the parser from here
                progress.update(line_bytes, 0);
                continue;
            }

            if !seen_payload && logical == parser::HEADER_LINE {
                // 📋 the one free pass: a first non-empty line that IS the
                // canonical header gets discarded, not parsed
                debug!("📋 reader {} skipped the header in '{}'", self.worker_id, path);
                seen_payload = true;
                progress.update(line_bytes, 0);
                continue;
            }
            seen_payload = true;

            match parser::parse(logical) {
                Ok(event) => {
                    if !self.put_event(event).await? {
                        // 🛑 cancellation interrupted the put; the event was
                        // not delivered and is not counted. Reader goes home.
                        return Ok(());
                    }
                    progress.update(line_bytes, 1);
                }
                Err(ParseError::Empty) => {
                    // -- 💤 unreachable given the blank check above, but the
                    // -- match stays total instead of clever
                    progress.update(line_bytes, 0);
                }
                Err(err) => {
                    // ⚠️ malformed line: count it, log it, keep moving.
                    // One typo does not get to cancel a physics run.
                    self.counters.record_parse_reject();
                    warn!(
                        "⚠️ reader {} rejected a line from '{}': {} — logged, counted, life goes on",
                        self.worker_id, path, err
                    );
                    progress.update(line_bytes, 0);
                }
            }
        }

        progress.finish();
        Ok(())
    }

    /// 📤 The two-step put, with the counter choreography attached:
    /// a refused offer bumps `offers_refused` (backpressure made visible),
    /// a delivered event bumps `produced`. Returns false when cancellation
    /// interrupted the put — the caller's cue to stop reading.
    async fn put_event(&self, event: CollisionEvent) -> Result<bool> {
        match buffer::put_with_backpressure(
            &self.tx,
            BufferItem::Event(event),
            self.offer_timeout,
            &self.cancel,
        )
        .await
        {
            PutOutcome::Sent { refused_first } => {
                if refused_first {
                    self.counters.record_offer_refused();
                }
                self.counters.record_produced();
                Ok(true)
            }
            PutOutcome::Cancelled => Ok(false),
            PutOutcome::Closed => {
                // 💀 consumers are gone while a reader still has data. The
                // lifecycle makes this impossible on purpose; if it happens
                // anyway, loud beats quiet.
                anyhow::bail!(
                    "💀 buffer closed under a live reader — the shutdown protocol has been violated and someone should hear about it"
                )
            }
        }
    }
}

impl Worker for ReaderWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📖 reader {} started — {} file(s) assigned", self.worker_id, self.inputs.len());
            self.run().await
        })
    }
}
