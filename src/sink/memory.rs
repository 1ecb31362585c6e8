//! In-process sink
//!
//! Keeps every resource as a `Vec<Record>` in memory. Used by tests and
//! `--sink memory` dry runs.

use super::types::{record_key, Sink, SinkOutcome, DEFAULT_KEY_FIELD};
use crate::error::Result;
use crate::types::{Record, RecordStream, WriteDisposition};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Sink holding rows in memory
#[derive(Debug)]
pub struct MemorySink {
    key_field: String,
    tables: Mutex<HashMap<String, Vec<Record>>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Empty sink upserting by `id`
    pub fn new() -> Self {
        Self::with_key_field(DEFAULT_KEY_FIELD)
    }

    /// Empty sink upserting by `key_field`
    pub fn with_key_field(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Rows of `resource`, in write order
    pub fn rows(&self, resource: &str) -> Vec<Record> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Resources written so far, sorted
    pub fn resources(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        records: RecordStream,
    ) -> Result<SinkOutcome> {
        // Staged first so a failing stream changes nothing
        let staged: Vec<Record> = records.try_collect().await?;
        let written = staged.len() as u64;

        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let rows = tables.entry(resource.to_string()).or_default();

        match disposition {
            WriteDisposition::Replace => *rows = staged,
            WriteDisposition::Append => rows.extend(staged),
            WriteDisposition::Incremental => {
                for record in staged {
                    let existing = record_key(&record, &self.key_field).and_then(|key| {
                        rows.iter()
                            .position(|row| record_key(row, &self.key_field).as_ref() == Some(&key))
                    });
                    match existing {
                        Some(index) => rows[index] = record,
                        None => rows.push(record),
                    }
                }
            }
        }

        Ok(SinkOutcome::new(resource, disposition, written))
    }
}
