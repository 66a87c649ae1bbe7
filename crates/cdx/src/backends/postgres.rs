//! 🐘 The Postgres backend — rows go in at the speed of SQL, which is to say,
//! "fast enough until it isn't." May your transactions be ever committed. 🌿

mod postgres_sink;

pub(crate) use postgres_sink::PostgresSink;
// 🎯 pub because `app_config` re-exports this as part of the public config surface
pub use postgres_sink::PostgresSinkConfig;
