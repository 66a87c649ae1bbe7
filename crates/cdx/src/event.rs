//! 📦 Event data structures — the building blocks of collidr
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. DETECTOR HALL — BEAM CROSSING 847 OF THE NIGHT SHIFT
//!
//! 🌩️  Somewhere underground, two beams meet at nearly the speed of light.
//! Particles shatter into other particles. A tracker blinks. A CSV file
//! grows by one line. Nobody claps. The physics does not need applause.
//!
//! ✅ And then — a `CollisionEvent` is born. Quietly. Carrying its UUID,
//! its timestamp, and the one number anybody downstream will ever ask it
//! about. It does not know whether it will survive the threshold filter.
//! Statistically, it should start packing.
//!
//! 🦆
//!
//! This module defines the humble yet load-bearing value that ferries one
//! collision from a text file to a database row. It is the cargo, not the
//! conveyor — everything else in this crate exists to move it or count it.
//!
//! ---
//!
//! ⚠️  NOTE: there is NO sentinel record in this crate. Termination travels
//! as its own `BufferItem::Drain` variant, so no event ever carries a
//! reserved energy value or a nil UUID. The type system is the bouncer now.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 🎭 The closed set of particle classes we admit through the front door.
///
/// Three variants. That's it. That's the whole standard model we support.
/// (The actual Standard Model has more. The actual Standard Model also has
/// funding. We have an enum.)
///
/// Extending the set means editing this enum — `from_token` and `as_str`
/// live right below, so the compiler will walk you through every match arm
/// like a very pedantic tour guide. This is a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// ⚡ The electron: small, negative, everywhere. The intern of particles.
    Electron,
    /// 🌀 The muon: an electron that hit the gym and developed a short lifespan.
    Muon,
    /// 🧱 The proton: the load-bearing wall of ordinary matter.
    Proton,
}

impl ParticleKind {
    /// 🎯 Decode a wire token into a kind — case-insensitive, closed set.
    ///
    /// `"MUON"`, `"muon"`, `"MuOn"` — all the same particle, all welcome.
    /// Anything outside the set gets `None` and the parser turns that into
    /// a proper diagnostic. We do not guess. Guessing is how you end up
    /// with a "tau" row in production and a very awkward standup.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("electron") {
            Some(Self::Electron)
        } else if token.eq_ignore_ascii_case("muon") {
            Some(Self::Muon)
        } else if token.eq_ignore_ascii_case("proton") {
            Some(Self::Proton)
        } else {
            // -- 💀 not on the list. the rope stays up.
            None
        }
    }

    /// 📛 The canonical lowercase token — the form that gets persisted.
    /// One spelling at the sink, forever. Future analysts will thank us,
    /// silently, by never noticing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electron => "electron",
            Self::Muon => "muon",
            Self::Proton => "proton",
        }
    }
}

/// 🎯 A singular `CollisionEvent` — one collision, one destiny, zero guarantees.
///
/// This is the atomic unit of ingestion: a single event, parsed out of a
/// text line, small enough to be `Copy` — it crosses the bounded channel
/// by value and nothing ever misses it.
///
/// Immutable after construction — downstream code counts it, filters it,
/// or persists it, and none of those jobs get a `&mut`.
///
/// # Invariants 📜
/// - `energy_gev` is finite and non-negative for every event the parser or
///   the generator produces. Negative energy does not exist here. This is
///   not a physics statement. This is a type-discipline statement.
/// - `id` is a real v4-shaped UUID. The primary key at the sink. Two events
///   with the same id are, as far as the database cares, the same event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// 🆔 128 bits of identity. The primary key. The name on the mailbox.
    pub id: Uuid,
    /// ⏰ When the collision happened, UTC, millisecond-or-better precision.
    pub timestamp: DateTime<Utc>,
    /// ⚡ Energy in GeV. The single number the whole filter stage cares about.
    pub energy_gev: f64,
    /// 🎭 Which member of our three-particle standard model this was.
    pub kind: ParticleKind,
    /// 📡 Did the tracker actually see it, or are we taking the calorimeter's word for it?
    pub detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 🧪 Token decoding is case-insensitive and the canonical form round-trips.
    #[test]
    fn the_one_where_every_spelling_of_muon_is_still_a_muon() {
        assert_eq!(ParticleKind::from_token("muon"), Some(ParticleKind::Muon));
        assert_eq!(ParticleKind::from_token("MUON"), Some(ParticleKind::Muon));
        assert_eq!(ParticleKind::from_token("MuOn"), Some(ParticleKind::Muon));
        assert_eq!(
            ParticleKind::from_token("electron"),
            Some(ParticleKind::Electron)
        );
        assert_eq!(ParticleKind::from_token("PROTON"), Some(ParticleKind::Proton));

        // ✅ canonical token survives the round trip
        for kind in [
            ParticleKind::Electron,
            ParticleKind::Muon,
            ParticleKind::Proton,
        ] {
            assert_eq!(ParticleKind::from_token(kind.as_str()), Some(kind));
        }
    }

    /// 🧪 The set is closed. No write-in candidates.
    #[test]
    fn the_one_where_the_tau_was_turned_away_at_the_door() {
        assert_eq!(ParticleKind::from_token("tau"), None);
        assert_eq!(ParticleKind::from_token("neutrino"), None);
        assert_eq!(ParticleKind::from_token(""), None);
        assert_eq!(ParticleKind::from_token("muonn"), None);
    }
}
