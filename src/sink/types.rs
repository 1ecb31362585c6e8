//! Sink trait and shared helpers

use crate::config::{SinkKind, SinkSettings};
use crate::error::Result;
use crate::types::{JsonValue, Record, RecordStream, WriteDisposition};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Default upsert key for `incremental` loads
pub const DEFAULT_KEY_FIELD: &str = "id";

// ============================================================================
// Sink Trait
// ============================================================================

/// Downstream store records are forwarded to, one resource at a time
///
/// `replace` truncates prior contents, `append` appends, and `incremental`
/// upserts by the sink's key field. A stream error leaves the resource as it
/// was before the call.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Consume `records` into `resource`
    async fn put(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        records: RecordStream,
    ) -> Result<SinkOutcome>;
}

/// What one `put` wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkOutcome {
    /// Resource name
    pub resource: String,
    /// Disposition applied
    pub disposition: WriteDisposition,
    /// Records written
    pub records_written: u64,
}

impl SinkOutcome {
    /// Outcome for `resource`
    pub fn new(resource: &str, disposition: WriteDisposition, records_written: u64) -> Self {
        Self {
            resource: resource.to_string(),
            disposition,
            records_written,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Upsert key of a record: string or number under `key_field`
pub fn record_key(record: &Record, key_field: &str) -> Option<String> {
    match record.get(key_field)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the sink named by `settings`
pub fn open_sink(settings: &SinkSettings) -> Result<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match settings.kind {
        SinkKind::Memory => Arc::new(super::MemorySink::new()),
        SinkKind::Duckdb => Arc::new(super::DuckDbSink::open(&settings.path)?),
        SinkKind::Jsonl => Arc::new(super::JsonlSink::new(&settings.path)?),
    };
    Ok(sink)
}
