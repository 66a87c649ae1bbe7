//! 📊 progress.rs — the part of the pipeline that exists for the human
//! standing in front of it.
//!
//! 🚀 Each reader worker owns one of these and feeds it as it chews through
//! its input file. Bytes in, records out, a bar that creeps rightward.
//! None of it changes what gets ingested; all of it changes whether you
//! trust the ingest while it's happening.
//!
//! ⚠️  The bar reports progress. It does not grant it. We checked.
//!
//! 🦆 The duck requested a progress bar of its own. Request denied.

use indicatif::{ProgressBar, ProgressStyle};

/// 📊 Per-reader progress: bytes consumed, records produced, one bar.
///
/// Deliberately dumber than a full metrics system — the run-wide truth lives
/// in `PipelineCounters`; this is the human-facing "the file is moving"
/// signal. If the two ever disagree, trust the counters, comfort the bar.
///
/// # Ancient Proverb
/// "An ingest with no progress bar finishes exactly when you stop believing in it."
pub(crate) struct ProgressMetrics {
    /// 🏷️ what are we even reading? shows up in the bar message
    source_name: String,
    /// 📦 bytes consumed so far — the bar's position, the file's countdown
    total_bytes: u64,
    /// 📄 records produced so far — the number the bar is actually bragging about
    total_records: u64,
    /// 🎨 the indicatif bar that owns the terminal redraw work
    progress_bar: ProgressBar,
}

// 🐛 NOTE: the bar is intentionally excluded from this Debug impl —
// a terminal redraw handle has nothing useful to say in a log line.
impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_bytes", &self.total_bytes)
            .field("total_records", &self.total_records)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 Spin up a fresh progress tracker for one input.
    ///
    /// `total_size` is the file size in bytes — pass 0 for "I have no idea"
    /// and the bar will simply never claim a percentage it can't back up.
    pub(crate) fn new(source_name: String, total_size: u64) -> Self {
        // -- 🎨 house colors: cyan for the part that's done, blue for the wait
        let progress_bar = ProgressBar::new(total_size);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n| [{bar:40.cyan/blue}]")
                .unwrap() // -- 🐛 hardcoded template; if this fires, the typo is in THIS file
                .progress_chars("=>-"),
        );

        Self {
            source_name,
            total_bytes: 0,
            total_records: 0,
            progress_bar,
        }
    }

    /// 🔄 Feed the tracker after each line: how many bytes we moved past,
    /// how many records that produced (0 for skipped/blank/header lines).
    pub(crate) fn update(&mut self, bytes_read: u64, records_read: u64) {
        // -- 📦 running totals; the bar re-renders on every feed
        self.total_bytes += bytes_read;
        self.total_records += records_read;

        self.progress_bar.set_position(self.total_bytes);
        self.progress_bar.set_message(format!(
            "source: {} — {} records",
            self.source_name, self.total_records
        ));
    }

    /// ✅ Pin the bar at done. From here, EOF and triumph are
    /// indistinguishable — which is the point.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }
}
