//! Tests for sink module

use super::*;
use crate::config::{SinkKind, SinkSettings};
use crate::error::Error;
use crate::types::{Record, RecordStream, WriteDisposition};
use futures::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;

fn rec(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn records(values: Vec<serde_json::Value>) -> RecordStream {
    stream::iter(values.into_iter().map(|v| Ok(rec(v)))).boxed()
}

fn failing_after(values: Vec<serde_json::Value>) -> RecordStream {
    let items: Vec<crate::error::Result<Record>> = values
        .into_iter()
        .map(|v| Ok(rec(v)))
        .chain(std::iter::once(Err(Error::malformed("boom"))))
        .collect();
    stream::iter(items).boxed()
}

// ============================================================================
// Helper Tests
// ============================================================================

#[test]
fn test_record_key() {
    assert_eq!(record_key(&rec(json!({"id": 7})), "id"), Some("7".to_string()));
    assert_eq!(
        record_key(&rec(json!({"id": "gid://shopify/Page/1"})), "id"),
        Some("gid://shopify/Page/1".to_string())
    );
    assert_eq!(record_key(&rec(json!({"id": ""})), "id"), None);
    assert_eq!(record_key(&rec(json!({"id": null})), "id"), None);
    assert_eq!(record_key(&rec(json!({"name": "x"})), "id"), None);
}

// ============================================================================
// MemorySink Tests
// ============================================================================

#[tokio::test]
async fn test_memory_replace_is_idempotent() {
    let sink = MemorySink::new();
    let batch = || records(vec![json!({"id": 1}), json!({"id": 2})]);

    sink.put("pages", WriteDisposition::Replace, batch()).await.unwrap();
    let once = sink.rows("pages");
    let outcome = sink.put("pages", WriteDisposition::Replace, batch()).await.unwrap();

    assert_eq!(outcome.records_written, 2);
    assert_eq!(sink.rows("pages"), once);
}

#[tokio::test]
async fn test_memory_append() {
    let sink = MemorySink::new();
    sink.put("tx", WriteDisposition::Append, records(vec![json!({"id": 1})]))
        .await
        .unwrap();
    sink.put("tx", WriteDisposition::Append, records(vec![json!({"id": 1})]))
        .await
        .unwrap();

    assert_eq!(sink.rows("tx").len(), 2);
}

#[tokio::test]
async fn test_memory_incremental_upserts() {
    let sink = MemorySink::new();
    sink.put(
        "orders",
        WriteDisposition::Replace,
        records(vec![json!({"id": 1, "v": "a"}), json!({"id": 2, "v": "a"})]),
    )
    .await
    .unwrap();

    sink.put(
        "orders",
        WriteDisposition::Incremental,
        records(vec![
            json!({"id": 2, "v": "b"}),
            json!({"id": 3, "v": "b"}),
            json!({"v": "keyless"}),
        ]),
    )
    .await
    .unwrap();

    assert_eq!(
        sink.rows("orders"),
        vec![
            rec(json!({"id": 1, "v": "a"})),
            rec(json!({"id": 2, "v": "b"})),
            rec(json!({"id": 3, "v": "b"})),
            rec(json!({"v": "keyless"})),
        ]
    );
}

#[tokio::test]
async fn test_memory_stream_error_leaves_state() {
    let sink = MemorySink::new();
    sink.put("pages", WriteDisposition::Replace, records(vec![json!({"id": 1})]))
        .await
        .unwrap();

    let result = sink
        .put("pages", WriteDisposition::Replace, failing_after(vec![json!({"id": 9})]))
        .await;

    assert!(result.is_err());
    assert_eq!(sink.rows("pages"), vec![rec(json!({"id": 1}))]);
    assert_eq!(sink.resources(), vec!["pages"]);
}

// ============================================================================
// DuckDbSink Tests
// ============================================================================

#[tokio::test]
async fn test_duckdb_replace_twice() {
    let sink = DuckDbSink::in_memory().unwrap();
    let batch = || records(vec![json!({"id": 1, "title": "a"}), json!({"id": 2, "title": "b"})]);

    sink.put("pages", WriteDisposition::Replace, batch()).await.unwrap();
    sink.put("pages", WriteDisposition::Replace, batch()).await.unwrap();

    assert_eq!(sink.row_count("pages").await.unwrap(), 2);
    assert_eq!(
        sink.rows("pages").await.unwrap(),
        vec![
            rec(json!({"id": 1, "title": "a"})),
            rec(json!({"id": 2, "title": "b"})),
        ]
    );
}

#[tokio::test]
async fn test_duckdb_incremental_and_append() {
    let sink = DuckDbSink::in_memory().unwrap();

    sink.put(
        "orders",
        WriteDisposition::Append,
        records(vec![json!({"id": 1, "v": 1}), json!({"id": 2, "v": 1})]),
    )
    .await
    .unwrap();
    let outcome = sink
        .put(
            "orders",
            WriteDisposition::Incremental,
            records(vec![json!({"id": 2, "v": 2}), json!({"id": 3, "v": 2})]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.records_written, 2);
    assert_eq!(outcome.disposition, WriteDisposition::Incremental);
    assert_eq!(sink.row_count("orders").await.unwrap(), 3);

    let rows = sink.rows("orders").await.unwrap();
    let two: Vec<_> = rows.iter().filter(|r| r["id"] == json!(2)).collect();
    assert_eq!(two, vec![&rec(json!({"id": 2, "v": 2}))]);
}

#[tokio::test]
async fn test_duckdb_rollback_on_stream_error() {
    let sink = DuckDbSink::in_memory().unwrap();
    sink.put("pages", WriteDisposition::Replace, records(vec![json!({"id": 1})]))
        .await
        .unwrap();

    let result = sink
        .put(
            "pages",
            WriteDisposition::Replace,
            failing_after(vec![json!({"id": 2}), json!({"id": 3})]),
        )
        .await;

    assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    assert_eq!(sink.rows("pages").await.unwrap(), vec![rec(json!({"id": 1}))]);
}

#[tokio::test]
async fn test_duckdb_unknown_table_and_bad_name() {
    let sink = DuckDbSink::in_memory().unwrap();
    assert_eq!(sink.row_count("never").await.unwrap(), 0);
    assert!(sink.rows("never").await.unwrap().is_empty());

    let result = sink
        .put("bad name\"", WriteDisposition::Append, records(vec![]))
        .await;
    assert!(matches!(result, Err(Error::Sink { .. })));
}

#[tokio::test]
async fn test_duckdb_file_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.duckdb");

    {
        let sink = DuckDbSink::open(&path).unwrap();
        sink.put("blogs", WriteDisposition::Replace, records(vec![json!({"id": 5})]))
            .await
            .unwrap();
    }

    let reopened = DuckDbSink::open(&path).unwrap();
    assert_eq!(reopened.row_count("blogs").await.unwrap(), 1);
}

// ============================================================================
// JsonlSink Tests
// ============================================================================

fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_jsonl_replace_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path().join("out")).unwrap();

    sink.put("pages", WriteDisposition::Replace, records(vec![json!({"id": 1})]))
        .await
        .unwrap();
    sink.put("pages", WriteDisposition::Replace, records(vec![json!({"id": 2})]))
        .await
        .unwrap();
    sink.put("pages", WriteDisposition::Append, records(vec![json!({"id": 3})]))
        .await
        .unwrap();

    assert_eq!(
        read_lines(&sink.path_for("pages")),
        vec![json!({"id": 2}), json!({"id": 3})]
    );
}

#[tokio::test]
async fn test_jsonl_stream_error_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path()).unwrap();

    sink.put("blogs", WriteDisposition::Replace, records(vec![json!({"id": 1})]))
        .await
        .unwrap();
    let result = sink
        .put("blogs", WriteDisposition::Append, failing_after(vec![json!({"id": 2})]))
        .await;

    assert!(result.is_err());
    assert_eq!(read_lines(&sink.path_for("blogs")), vec![json!({"id": 1})]);
    assert!(!dir.path().join(".blogs.jsonl.staging").exists());
}

#[tokio::test]
async fn test_jsonl_rejects_path_names() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path()).unwrap();
    let result = sink
        .put("../escape", WriteDisposition::Replace, records(vec![]))
        .await;
    assert!(result.is_err());
}

// ============================================================================
// Factory Tests
// ============================================================================

#[test]
fn test_open_sink_kinds() {
    let dir = tempfile::tempdir().unwrap();

    let memory = open_sink(&SinkSettings {
        kind: SinkKind::Memory,
        path: dir.path().to_path_buf(),
    })
    .unwrap();
    assert_eq!(memory.name(), "memory");

    let jsonl = open_sink(&SinkSettings {
        kind: SinkKind::Jsonl,
        path: dir.path().join("jsonl"),
    })
    .unwrap();
    assert_eq!(jsonl.name(), "jsonl");

    let duckdb = open_sink(&SinkSettings {
        kind: SinkKind::Duckdb,
        path: dir.path().join("db.duckdb"),
    })
    .unwrap();
    assert_eq!(duckdb.name(), "duckdb");
}
