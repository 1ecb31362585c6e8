//! Sink module
//!
//! Where extracted records end up.
//!
//! # Overview
//!
//! - `Sink` - `put(resource, disposition, records)` for one resource
//! - `MemorySink` - rows kept in process, for tests and dry runs
//! - `DuckDbSink` - one DuckDB table per resource, JSON payload column
//! - `JsonlSink` - one JSON Lines file per resource

mod duckdb_sink;
mod jsonl;
mod memory;
mod types;

pub use duckdb_sink::DuckDbSink;
pub use jsonl::JsonlSink;
pub use memory::MemorySink;
pub use types::{open_sink, record_key, Sink, SinkOutcome, DEFAULT_KEY_FIELD};

#[cfg(test)]
mod tests;
