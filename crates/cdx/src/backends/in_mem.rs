//! 🧠 The in-memory backend — a database impression good enough to fool
//! the pipeline, gone the moment the process is.

mod in_mem_sink;

pub(crate) use in_mem_sink::InMemorySink;
