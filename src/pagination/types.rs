//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by both strategies.

use crate::error::Result;
use crate::types::Record;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::fmt;

/// Opaque token naming the next page
///
/// For GraphQL this is an end cursor; for REST it is the literal next URL.
/// Passed back verbatim, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw token
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of records plus where to go next
///
/// Built only through [`PageResult::last`] and [`PageResult::more`], so a
/// page without more data never carries a token.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    records: Vec<Record>,
    next_token: Option<PageToken>,
}

impl PageResult {
    /// Final page
    pub fn last(records: Vec<Record>) -> Self {
        Self {
            records,
            next_token: None,
        }
    }

    /// Page followed by another one reachable through `token`
    pub fn more(records: Vec<Record>, token: PageToken) -> Self {
        Self {
            records,
            next_token: Some(token),
        }
    }

    /// Whether another page exists
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }

    /// Records on this page, in server order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Token for the next page
    pub fn next_token(&self) -> Option<&PageToken> {
        self.next_token.as_ref()
    }

    /// Split into records and token
    pub fn into_parts(self) -> (Vec<Record>, Option<PageToken>) {
        (self.records, self.next_token)
    }
}

/// Tracks progress while a fetcher walks pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Pages fetched so far
    pub pages: u32,
    /// Records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fetched page
    pub fn add_page(&mut self, records: usize) {
        self.pages += 1;
        self.total_fetched += records as u64;
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}

/// Core trait for page cursor strategies
///
/// A strategy turns one response into a [`PageResult`]. It never performs
/// I/O and holds no per-run state, so one instance can drive many fetchers.
pub trait PageStrategy: Send + Sync + fmt::Debug {
    /// Extract the page from a response body and headers
    fn process_response(&self, body: &Value, headers: &HeaderMap) -> Result<PageResult>;
}

/// Walk a dot-separated path of object keys
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        _ => None,
    })
}
