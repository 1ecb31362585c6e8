//! Pagination strategy implementations
//!
//! Each strategy handles one of the platform's pagination idioms.

use super::types::{lookup_path, PageResult, PageStrategy, PageToken};
use crate::error::{Error, Result};
use crate::types::Record;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Cursor Pagination (GraphQL connections)
// ============================================================================

/// Where the next-page cursor is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorSource {
    /// `pageInfo { hasNextPage endCursor }`
    #[default]
    PageInfo,
    /// `cursor` of the last edge; an empty edge list ends pagination
    LastEdge,
}

/// GraphQL connection pagination
///
/// Reads `edges[*].node` and the next cursor from the connection found at
/// `data.<connection_path>`. The connection may be nested, e.g.
/// `location.inventoryLevels`.
#[derive(Debug, Clone)]
pub struct CursorStrategy {
    /// Dot path of the connection below `data`
    pub connection_path: String,
    /// Cursor source
    pub source: CursorSource,
}

impl CursorStrategy {
    /// Create a strategy reading `pageInfo`
    pub fn new(connection_path: impl Into<String>) -> Self {
        Self {
            connection_path: connection_path.into(),
            source: CursorSource::PageInfo,
        }
    }

    /// Set the cursor source
    #[must_use]
    pub fn with_source(mut self, source: CursorSource) -> Self {
        self.source = source;
        self
    }

    fn connection<'a>(&self, body: &'a Value) -> Result<&'a Value> {
        let data = match body.get("data") {
            Some(data) if data.is_object() => data,
            _ => {
                return Err(Error::malformed(format!(
                    "response has no 'data' object{}",
                    graphql_errors(body)
                )))
            }
        };

        match lookup_path(data, &self.connection_path) {
            Some(conn) if conn.is_object() => Ok(conn),
            _ => Err(Error::malformed(format!(
                "missing connection 'data.{}'{}",
                self.connection_path,
                graphql_errors(body)
            ))),
        }
    }

    fn page_info_token(&self, conn: &Value) -> Result<Option<PageToken>> {
        let page_info = conn
            .get("pageInfo")
            .filter(|v| v.is_object())
            .ok_or_else(|| {
                Error::malformed(format!("missing 'pageInfo' on '{}'", self.connection_path))
            })?;

        let has_next = page_info
            .get("hasNextPage")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "missing 'pageInfo.hasNextPage' on '{}'",
                    self.connection_path
                ))
            })?;

        if !has_next {
            return Ok(None);
        }

        match page_info.get("endCursor").and_then(Value::as_str) {
            Some(cursor) if !cursor.is_empty() => Ok(Some(PageToken::new(cursor))),
            _ => Err(Error::malformed(format!(
                "'{}' reports hasNextPage without an endCursor",
                self.connection_path
            ))),
        }
    }

    fn last_edge_token(&self, conn: &Value, edges: &[Value]) -> Result<Option<PageToken>> {
        let exhausted = conn
            .get("pageInfo")
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            == Some(false);

        let Some(last) = edges.last() else {
            return Ok(None);
        };
        if exhausted {
            return Ok(None);
        }

        match last.get("cursor").and_then(Value::as_str) {
            Some(cursor) if !cursor.is_empty() => Ok(Some(PageToken::new(cursor))),
            _ => Err(Error::malformed(format!(
                "last edge of '{}' has no cursor",
                self.connection_path
            ))),
        }
    }
}

impl PageStrategy for CursorStrategy {
    fn process_response(&self, body: &Value, _headers: &HeaderMap) -> Result<PageResult> {
        let conn = self.connection(body)?;

        let edges = conn
            .get("edges")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::malformed(format!("missing 'edges' on '{}'", self.connection_path))
            })?;

        let records = edges
            .iter()
            .map(|edge| match edge.get("node") {
                Some(Value::Object(node)) => Ok(node.clone()),
                _ => Err(Error::malformed(format!(
                    "edge without an object 'node' on '{}'",
                    self.connection_path
                ))),
            })
            .collect::<Result<Vec<Record>>>()?;

        let token = match self.source {
            CursorSource::PageInfo => self.page_info_token(conn)?,
            CursorSource::LastEdge => self.last_edge_token(conn, edges)?,
        };

        Ok(match token {
            Some(token) => PageResult::more(records, token),
            None => PageResult::last(records),
        })
    }
}

/// Render top-level GraphQL `errors` for inclusion in a malformed message
fn graphql_errors(body: &Value) -> String {
    let Some(errors) = body.get("errors") else {
        return String::new();
    };

    let messages: Vec<String> = match errors {
        Value::Array(items) => items
            .iter()
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| e.to_string(), str::to_string)
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    };

    format!(" (errors: {})", messages.join("; "))
}

// ============================================================================
// Link Header Pagination (REST)
// ============================================================================

/// Link header pagination
///
/// Records come from the body array under `records_key`; the next page is
/// the URL of the `Link` entry whose rel is exactly `next`.
/// Format: `Link: <https://shop/admin/api/2024-01/pages.json?page_info=..>; rel="next"`
#[derive(Debug, Clone)]
pub struct LinkHeaderStrategy {
    /// Body key holding the record array
    pub records_key: String,
    /// Rel value to follow
    pub rel: String,
}

impl LinkHeaderStrategy {
    /// Create a strategy following `rel="next"`
    pub fn new(records_key: impl Into<String>) -> Self {
        Self {
            records_key: records_key.into(),
            rel: "next".to_string(),
        }
    }
}

impl PageStrategy for LinkHeaderStrategy {
    fn process_response(&self, body: &Value, headers: &HeaderMap) -> Result<PageResult> {
        let records = records_at(body, &self.records_key)?;

        let next = headers
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| parse_link_header(v, &self.rel));

        Ok(match next {
            Some(url) => PageResult::more(records, PageToken::new(url)),
            None => PageResult::last(records),
        })
    }
}

/// Parse a Link header and extract the URL for the given rel
///
/// Entries look like `<url>; rel="next", <url>; rel="prev"`. The URL is taken
/// verbatim from between the angle brackets, so commas or semicolons inside
/// it do not split the entry. A rel list such as `rel="next last"` matches
/// each member exactly.
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    let mut rest = header;

    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let close = after_open.find('>')?;
        let url = &after_open[..close];
        let params_and_more = &after_open[close + 1..];

        let params_end = params_and_more.find('<').unwrap_or(params_and_more.len());
        let params = &params_and_more[..params_end];

        let matched = params.split(';').any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                return false;
            }
            value
                .trim()
                .trim_end_matches(',')
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .split_whitespace()
                .any(|rel| rel == target_rel)
        });

        if matched {
            return Some(url.to_string());
        }
        rest = &params_and_more[params_end..];
    }

    None
}

// ============================================================================
// Single Page
// ============================================================================

/// Single request, no pagination
///
/// Used for parent lists fetched in one shot and for per-parent metafield
/// lookups.
#[derive(Debug, Clone)]
pub struct SinglePageStrategy {
    /// Body key holding the record array
    pub records_key: String,
}

impl SinglePageStrategy {
    /// Create a single page strategy
    pub fn new(records_key: impl Into<String>) -> Self {
        Self {
            records_key: records_key.into(),
        }
    }
}

impl PageStrategy for SinglePageStrategy {
    fn process_response(&self, body: &Value, _headers: &HeaderMap) -> Result<PageResult> {
        Ok(PageResult::last(records_at(body, &self.records_key)?))
    }
}

/// Read the record array under `key`, every element must be an object
fn records_at(body: &Value, key: &str) -> Result<Vec<Record>> {
    let items = lookup_path(body, key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(format!("response has no '{key}' array")))?;

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map.clone()),
            other => Err(Error::malformed(format!(
                "non-object entry in '{key}': {other}"
            ))),
        })
        .collect()
}
