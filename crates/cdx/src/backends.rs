//! 🔌 Backends — the part of the crate that actually touches the world.
//!
//! 🚰 Everything upstream of here is careful bookkeeping. Down here, rows
//! hit storage and errors get real. Two destinations on offer: a Postgres
//! that remembers forever, and an in-memory stand-in that remembers until
//! the process blinks.
//!
//! 🎭 Need a third? Add a `SinkBackend` variant, implement `Sink`, and the
//! compiler will hand you an itemized list of every match arm you now owe.
//!
//! 🦆 The duck remains on staff here. It supervises the supervisors.
//! Nobody pays it.

pub(crate) mod in_mem;
pub(crate) mod postgres;
pub(crate) mod sink;

// 🎯 Re-export the load-bearing names so callers write `backends::SinkBackend`
// without memorizing the directory layout. Paths are for modules, not people.
pub(crate) use postgres::PostgresSinkConfig;
pub(crate) use sink::{Sink, SinkBackend};
