//! Common types used throughout shopify-sync
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One platform entity as returned by the API
pub type Record = JsonObject;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

/// Lazy, finite, non-restartable sequence of records
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record>> + Send>>;

// ============================================================================
// Write Disposition
// ============================================================================

/// How the sink merges a batch of records into a named resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Truncate prior contents, then write
    #[default]
    Replace,
    /// Append new records
    Append,
    /// Upsert by a resource-specific key
    Incremental,
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteDisposition::Replace => "replace",
            WriteDisposition::Append => "append",
            WriteDisposition::Incremental => "incremental",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Endpoint Kind
// ============================================================================

/// Which API surface a resource is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// GraphQL endpoint, cursor connections
    Graph,
    /// REST endpoint, Link header pagination
    Rest,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Graph => f.write_str("graph"),
            EndpointKind::Rest => f.write_str("rest"),
        }
    }
}

// ============================================================================
// Resource Role
// ============================================================================

/// Whether a resource failure aborts the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    /// Core catalog resource, failure is fatal
    Primary,
    /// Best-effort resource, failure is logged
    #[default]
    Secondary,
}

/// API the resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiSurface {
    /// Shop Admin API
    #[default]
    Admin,
    /// Partner API
    Partner,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty or whitespace
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.trim().is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
