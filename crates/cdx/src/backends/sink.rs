use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{in_mem, postgres};
use crate::event::CollisionEvent;

/// 🕳️ A sink that commits batches of events — transactional I/O, zero logic.
///
/// The last stop on the line. Sinks don't filter, don't batch, don't
/// retry — they take a finished batch and make it durable, or say plainly
/// that they couldn't. Every clever decision happens upstream, where it
/// can be tested without a database in the room.
///
/// # Contract 📜
/// - `insert_batch` commits the WHOLE slice in a single transaction: all
///   rows land or the call returns an error and none of them count.
/// - Duplicate primary keys are NO-OPS, not errors. Ingesting the same file
///   twice yields the same row set and zero drama. Idempotence is the
///   product feature; `ON CONFLICT DO NOTHING` is merely the spelling.
/// - The return value is rows ACTUALLY inserted — duplicates are success
///   that happens to round down.
/// - `close` releases connections. The supervisor calls it exactly once,
///   after every consumer has joined. A sink left unclosed is a bug with a
///   connection pool attached.
/// - No retries in here. Retry policy belongs to whoever owns the error.
///
/// # Knowledge Graph 🧠
/// - Pattern: trait → concrete impls (PostgresSink, InMemorySink) → SinkBackend enum
/// - ConsumerWorker does: take → filter → batch → call sink.insert_batch(batch)
/// - Sink does: I/O. Just I/O. One transaction per call. Nothing else.
/// - Ancient proverb: a sink that filters is two bugs sharing one trait. 📜
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug {
    /// 📡 Commit one batch in one transaction. Duplicate ids no-op.
    /// Returns the number of rows actually inserted.
    async fn insert_batch(&self, events: &[CollisionEvent]) -> Result<u64>;
    /// 🗑️ Release every held resource. Called once per run, by the
    /// supervisor, after the last consumer has gone home.
    async fn close(&self) -> Result<()>;
}

/// 🎭 One enum, every destination — static dispatch over the places a
/// batch can land.
///
/// The supervisor matches on this once at startup and never thinks about
/// it again; consumers call `insert_batch` and genuinely cannot tell
/// whether their rows crossed a wire or a `BTreeMap`. That indifference IS
/// the interface.
///
/// Clone-able on purpose: the supervisor hands each consumer its own handle.
/// Under the hood that's a pool handle (Postgres) or an `Arc` (in-memory),
/// so cloning is cheap and everyone still agrees on what was committed.
#[derive(Debug, Clone)]
pub(crate) enum SinkBackend {
    /// 🧪 In-memory test sink — captures rows and commit sizes for assertions
    InMemory(in_mem::InMemorySink),
    /// 🐘 Postgres — the events' forever home, descending indexes included
    Postgres(postgres::PostgresSink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn insert_batch(&self, events: &[CollisionEvent]) -> Result<u64> {
        match self {
            SinkBackend::InMemory(sink) => sink.insert_batch(events).await,
            SinkBackend::Postgres(sink) => sink.insert_batch(events).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::Postgres(sink) => sink.close().await,
        }
    }
}
