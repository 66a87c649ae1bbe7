//! 🧵 Workers: the two species of task that actually move the data while
//! the Supervisor handles the moving of blame.
//!
//! 🚀 Factory floor rules: every worker owns its own tools (file handle,
//! batch Vec, sink handle), shares only what the supervisor issued it
//! (buffer end, counters, child token), and clocks out through a join
//! handle. The borrow checker is the floor manager, and it does not
//! do exceptions. 🦆
//!
//! Two species live here:
//! - **ReaderWorker** — opens files, parses lines, feeds the buffer.
//! - **ConsumerWorker** — drains the buffer, filters, batches, commits.

// 🩸 anyhow::Result is the blood type every worker donates in — one error
// currency across both pools, context attached at the wound.
use anyhow::Result;
use tokio::task::JoinHandle;

mod consumer_worker;
pub(crate) use consumer_worker::ConsumerWorker;
mod reader_worker;
pub(crate) use reader_worker::ReaderWorker;

/// 🏗️ A thing that runs in the background and eventually answers for itself.
///
/// `start` consumes the worker and hands back the JoinHandle — once a
/// worker is running, the supervisor owns exactly one thing about it: the
/// right to wait for it.
pub(crate) trait Worker {
    /// 🚀 Start the worker.
    fn start(self) -> JoinHandle<Result<()>>;
}
