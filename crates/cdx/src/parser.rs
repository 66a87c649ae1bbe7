//! 🔬 The line parser — five fields walk in, one event walks out. Maybe.
//!
//! 🧠 Knowledge graph: `parse()` is a pure function. No state, no locks,
//! no `self`, no feelings. Every reader worker calls it concurrently and
//! the function could not care less. This is the whole design: the parser
//! is the one part of the pipeline that never needs a meeting.
//!
//! Errors come back as a [`ParseError`] variant, one per field diagnosis —
//! no panics, no stack unwinding per bad line. A malformed record is a
//! `warn!` and a counter bump upstream, never a funeral.
//!
//! "He who throws exceptions per line, benchmarks in sorrow." — Ancient proverb 📜

use chrono::{DateTime, Utc};
use memchr::memchr_iter;
use uuid::Uuid;

use crate::event::{CollisionEvent, ParticleKind};

/// 📋 The canonical header line. Case-sensitive, comma-for-comma exact.
/// If the first non-empty line of an input matches this, the reader drops it
/// on the floor — politely, and without counting it as a parse failure.
pub const HEADER_LINE: &str = "event_id,timestamp,energy_gev,particle_type,detected_at_tracker";

/// 🔢 Exactly this many fields per record. Not four. Not six. Five.
const FIELD_COUNT: usize = 5;

/// 💀 Everything that can go wrong with one line, itemized.
///
/// One variant per field, plus the structural failures. The reader logs the
/// variant, bumps `rejected_parse`, and moves on with its life. Nobody
/// aborts a run over a typo in row 80,412.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// 💤 Empty or whitespace-only line. Not an error worth counting — the
    /// reader skips these like voicemails from unknown numbers.
    #[error("empty line")]
    Empty,
    /// 🔢 Wrong number of comma-separated fields. We asked for five.
    #[error("expected 5 fields, found {found}")]
    WrongArity { found: usize },
    /// 🆔 The id field would not decode as a canonical hyphenated UUID.
    #[error("event id is not a canonical uuid")]
    InvalidId,
    /// ⏰ The timestamp field would not decode as an ISO-8601 UTC instant.
    #[error("timestamp is not an ISO-8601 instant")]
    InvalidTimestamp,
    /// ⚡ The energy field was not a finite, non-negative double.
    #[error("energy is not a finite non-negative number")]
    InvalidEnergy,
    /// 🎭 The particle kind was not a member of the closed set.
    #[error("particle kind is not one of the known kinds")]
    InvalidKind,
    /// 📡 The detected flag was something other than true/false.
    #[error("detected flag is not a boolean literal")]
    InvalidBoolean,
}

/// 🔬 Parse one logical line into a [`CollisionEvent`].
///
/// Field order is fixed: `id, timestamp, energy, kind, detected`.
/// Whitespace around each field is stripped before decoding, because
/// humans and their CSV exporters cannot be trusted with the space bar.
///
/// # Contract 📜
/// - Pure and deterministic: same line in, same result out, forever.
/// - Safe for concurrent use from every reader at once. No shared anything.
/// - Negative energy is rejected HERE. There is no reserved value, no
///   magic `-1.0`, no winking at the parser. Termination is the buffer's
///   job (see `BufferItem::Drain`), not a number's.
pub fn parse(line: &str) -> Result<CollisionEvent, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    // 🔍 memchr does the comma hunting — SIMD under the hood, which is a
    // fancy way of saying "faster than you'd bother to hand-roll".
    let bytes = line.as_bytes();
    let mut fields: Vec<&str> = Vec::with_capacity(FIELD_COUNT);
    let mut start = 0usize;
    for comma in memchr_iter(b',', bytes) {
        fields.push(&line[start..comma]);
        start = comma + 1;
    }
    fields.push(&line[start..]);

    if fields.len() != FIELD_COUNT {
        // -- 🔢 four commas or bust. the arity police do not negotiate.
        return Err(ParseError::WrongArity {
            found: fields.len(),
        });
    }

    // 🧹 strip each field — "  muon " and "muon" are the same particle.
    let id_raw = fields[0].trim();
    let timestamp_raw = fields[1].trim();
    let energy_raw = fields[2].trim();
    let kind_raw = fields[3].trim();
    let detected_raw = fields[4].trim();

    // 🆔 Canonical form only: 32 hex digits, four dashes, 36 chars total.
    // Uuid::parse_str is generous (braces, urn:, undashed) — we are not.
    if id_raw.len() != 36 {
        return Err(ParseError::InvalidId);
    }
    let id = Uuid::parse_str(id_raw).map_err(|_| ParseError::InvalidId)?;

    // ⏰ RFC 3339 in, UTC out. Offsets are normalized; nonsense is rejected.
    let timestamp = DateTime::parse_from_rfc3339(timestamp_raw)
        .map_err(|_| ParseError::InvalidTimestamp)?
        .with_timezone(&Utc);

    // ⚡ Finite and non-negative, or nothing. NaN is not an energy. Infinity
    // is not an energy. Negative numbers are how other systems smuggle
    // sentinels around, and we left that life behind.
    let energy_gev: f64 = energy_raw.parse().map_err(|_| ParseError::InvalidEnergy)?;
    if !energy_gev.is_finite() || energy_gev < 0.0 {
        return Err(ParseError::InvalidEnergy);
    }

    let kind = ParticleKind::from_token(kind_raw).ok_or(ParseError::InvalidKind)?;

    // 📡 true/false, any casing, nothing else. "1", "yes", "y", "si" — all
    // rejected. A boolean field that accepts nine spellings is a string field
    // with commitment issues.
    let detected = if detected_raw.eq_ignore_ascii_case("true") {
        true
    } else if detected_raw.eq_ignore_ascii_case("false") {
        false
    } else {
        return Err(ParseError::InvalidBoolean);
    };

    Ok(CollisionEvent {
        id,
        timestamp,
        energy_gev,
        kind,
        detected,
    })
}
