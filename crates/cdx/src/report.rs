//! 📊 The terminal report — how a run says goodbye.
//!
//! 🚀 When the last consumer flushes its last batch, the supervisor freezes
//! the counters, checks the clock, and builds one of these. It is the
//! pipeline's closing argument: what came in, what got through, what went
//! sideways, and how fast the whole affair moved.
//!
//! 🍽️ Rendered with comfy-table, borderless, right-aligned — the same
//! minimalist table aesthetic as the live progress display, because a run
//! should end the way it ran.

use std::fmt;
use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

use crate::counters::CounterSnapshot;

/// 🔢 Comma-groups a count so the report reads at a glance. Six digits is
/// where eyeballs start lying; commas keep them honest.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    // -- 🧵 worst case adds one comma per three digits; size for it up front
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS.mmm for human-scale runs, HH:MM:SS once a run is long enough
/// that the milliseconds stopped being the interesting part.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        // -- 🔄 hour-plus territory: drop the millis, nobody is reading them now
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        // -- ✅ quick run — millisecond precision so short test runs aren't all "00:00"
        format!("{:02}:{:02}.{:03}", minutes, seconds, duration.subsec_millis())
    }
}

/// 📊 The terminal report for one completed run.
///
/// Returned by `run()` so callers can assert on it, and logged by the
/// supervisor so humans can read it. Both audiences get the same numbers —
/// there is one truth and it is this struct.
#[derive(Debug, Clone, Copy)]
pub struct IngestReport {
    /// ⏱️ Wall time from first worker spawn to last worker join.
    pub elapsed: Duration,
    /// 📸 The frozen scoreboard.
    pub counters: CounterSnapshot,
}

impl IngestReport {
    pub(crate) fn new(elapsed: Duration, counters: CounterSnapshot) -> Self {
        Self { elapsed, counters }
    }

    /// 🚀 Derived throughput: consumed events per second of wall time.
    ///
    /// A zero-duration run (empty inputs, fast machine, good karma) reports
    /// its consumed count rather than dividing by zero. We are not animals.
    pub fn events_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.consumed as f64 / secs
        } else {
            self.counters.consumed as f64
        }
    }

    /// 🍽️ Build the goodbye table. Two columns, right-aligned, no borders —
    /// the NOTHING preset, because the numbers are the furniture and the
    /// table just seats them.
    fn render_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let mut row = |label: &str, value: String| {
            table.add_row(vec![
                Cell::new(label).set_alignment(CellAlignment::Right),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        };

        row("produced", format_number(self.counters.produced));
        row("consumed", format_number(self.counters.consumed));
        row("retained", format_number(self.counters.retained));
        row("rejected (parse)", format_number(self.counters.rejected_parse));
        row("rejected (insert)", format_number(self.counters.rejected_insert));
        row("offers refused", format_number(self.counters.offers_refused));
        row("elapsed", format_duration(self.elapsed));
        row(
            "throughput",
            format!("{} events/s", format_number(self.events_per_sec() as u64)),
        );

        table
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_table())
    }
}
