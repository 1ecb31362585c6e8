//! Partition types
//!
//! Parent identifiers, foreign-key enrichment and the fan-out report.

use crate::types::{JsonValue, Record};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier of one parent record in a fan-out
///
/// Keeps the original JSON value so a numeric id stays numeric when it is
/// attached to child records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentId(JsonValue);

impl Hash for ParentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.is_string().hash(state);
        self.to_string().hash(state);
    }
}

impl ParentId {
    /// Read `key` (dot path allowed) from a parent record
    ///
    /// Only strings and numbers qualify; anything else yields `None`.
    pub fn from_record(record: &Record, key: &str) -> Option<Self> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let value = parts.try_fold(record.get(first)?, |current, part| current.get(part))?;

        match value {
            JsonValue::String(s) if !s.is_empty() => Some(Self(value.clone())),
            JsonValue::Number(_) => Some(Self(value.clone())),
            _ => None,
        }
    }

    /// The raw JSON value
    pub fn value(&self) -> &JsonValue {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            JsonValue::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<i64> for ParentId {
    fn from(id: i64) -> Self {
        Self(JsonValue::from(id))
    }
}

impl From<&str> for ParentId {
    fn from(id: &str) -> Self {
        Self(JsonValue::String(id.to_string()))
    }
}

impl From<String> for ParentId {
    fn from(id: String) -> Self {
        Self(JsonValue::String(id))
    }
}

/// Attach the owning parent's id under `foreign_key`
pub fn with_foreign_key(mut record: Record, foreign_key: &str, parent: &ParentId) -> Record {
    record.insert(foreign_key.to_string(), parent.value().clone());
    record
}

/// Running totals of a fan-out, shared with the workers
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    inner: Arc<ReportInner>,
}

#[derive(Debug, Default)]
struct ReportInner {
    parents_total: AtomicUsize,
    parents_succeeded: AtomicUsize,
    records: AtomicU64,
    failed: Mutex<Vec<String>>,
}

impl FanOutReport {
    /// Report for `parents_total` parents
    pub fn new(parents_total: usize) -> Self {
        let report = Self::default();
        report
            .inner
            .parents_total
            .store(parents_total, Ordering::Relaxed);
        report
    }

    pub(crate) fn record_success(&self, records: usize) {
        self.inner.parents_succeeded.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, parent: &ParentId) {
        self.inner
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(parent.to_string());
    }

    /// Parents to process
    pub fn parents_total(&self) -> usize {
        self.inner.parents_total.load(Ordering::Relaxed)
    }

    /// Parents whose child fetch completed
    pub fn parents_succeeded(&self) -> usize {
        self.inner.parents_succeeded.load(Ordering::Relaxed)
    }

    /// Ids of parents whose child fetch failed, in completion order
    pub fn failed_ids(&self) -> Vec<String> {
        self.inner
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of failed parents
    pub fn parents_failed(&self) -> usize {
        self.inner
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Child records forwarded so far
    pub fn records_forwarded(&self) -> u64 {
        self.inner.records.load(Ordering::Relaxed)
    }

    /// Point-in-time copy
    pub fn summary(&self) -> FanOutSummary {
        FanOutSummary {
            parents_total: self.parents_total(),
            parents_succeeded: self.parents_succeeded(),
            failed_ids: self.failed_ids(),
            records: self.records_forwarded(),
        }
    }
}

/// Snapshot of a [`FanOutReport`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanOutSummary {
    /// Parents to process
    pub parents_total: usize,
    /// Parents whose child fetch completed
    pub parents_succeeded: usize,
    /// Failed parent ids
    pub failed_ids: Vec<String>,
    /// Child records forwarded
    pub records: u64,
}
