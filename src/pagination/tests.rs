//! Tests for pagination module

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use test_case::test_case;

fn link_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("link", HeaderValue::from_str(value).unwrap());
    headers
}

// ============================================================================
// PageResult / PaginationState Tests
// ============================================================================

#[test]
fn test_page_result_last_has_no_token() {
    let page = PageResult::last(vec![]);
    assert!(!page.has_more());
    assert!(page.next_token().is_none());
}

#[test]
fn test_page_result_more_carries_token() {
    let page = PageResult::more(vec![], PageToken::new("abc"));
    assert!(page.has_more());
    assert_eq!(page.next_token().map(PageToken::as_str), Some("abc"));
}

#[test]
fn test_pagination_state_mutations() {
    let mut state = PaginationState::new();
    assert_eq!(state.pages, 0);

    state.add_page(100);
    state.add_page(0);
    assert_eq!(state.pages, 2);
    assert_eq!(state.total_fetched, 100);

    state.mark_done();
    assert!(state.done);
}

#[test]
fn test_lookup_path() {
    let body = json!({"a": {"b": {"c": 1}}});
    assert_eq!(lookup_path(&body, "a.b.c"), Some(&json!(1)));
    assert_eq!(lookup_path(&body, "$.a.b"), Some(&json!({"c": 1})));
    assert_eq!(lookup_path(&body, "a.x"), None);
    assert_eq!(lookup_path(&body, ""), Some(&body));
}

// ============================================================================
// Cursor Strategy Tests
// ============================================================================

#[test]
fn test_cursor_has_next_page() {
    let strategy = CursorStrategy::new("pages");
    let body = json!({
        "data": {"pages": {
            "edges": [{"node": {"id": "gid://shopify/Page/1"}}, {"node": {"id": "gid://shopify/Page/2"}}],
            "pageInfo": {"hasNextPage": true, "endCursor": "eyJsYXN0X2lkIjoyfQ"}
        }}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert!(page.has_more());
    assert_eq!(page.next_token().unwrap().as_str(), "eyJsYXN0X2lkIjoyfQ");
    assert_eq!(page.records().len(), 2);
    assert_eq!(page.records()[1]["id"], "gid://shopify/Page/2");
}

#[test]
fn test_cursor_last_page_drops_cursor() {
    let strategy = CursorStrategy::new("blogs");
    let body = json!({
        "data": {"blogs": {
            "edges": [{"node": {"id": 1}}],
            "pageInfo": {"hasNextPage": false, "endCursor": "stale"}
        }}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert!(!page.has_more());
    assert!(page.next_token().is_none());
}

#[test]
fn test_cursor_empty_edges_with_more() {
    let strategy = CursorStrategy::new("articles");
    let body = json!({
        "data": {"articles": {
            "edges": [],
            "pageInfo": {"hasNextPage": true, "endCursor": "c2"}
        }}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert!(page.records().is_empty());
    assert!(page.has_more());
}

#[test]
fn test_cursor_nested_connection() {
    let strategy = CursorStrategy::new("location.inventoryLevels");
    let body = json!({
        "data": {"location": {"inventoryLevels": {
            "edges": [{"node": {"id": "lvl-1", "available": 3}}],
            "pageInfo": {"hasNextPage": false, "endCursor": null}
        }}}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert_eq!(page.records()[0]["available"], 3);
    assert!(!page.has_more());
}

#[test_case(json!({"data": {"pages": {"edges": []}}}) ; "missing page info")]
#[test_case(json!({"data": {"pages": {"pageInfo": {"hasNextPage": false}}}}) ; "missing edges")]
#[test_case(json!({"data": {"pages": {"edges": [], "pageInfo": {}}}}) ; "missing has next page")]
#[test_case(json!({"data": {"pages": {"edges": [], "pageInfo": {"hasNextPage": true, "endCursor": null}}}}) ; "more without cursor")]
#[test_case(json!({"data": {"pages": {"edges": [{"cursor": "x"}], "pageInfo": {"hasNextPage": false}}}}) ; "edge without node")]
#[test_case(json!({"data": {}}) ; "missing connection")]
#[test_case(json!({"data": null}) ; "null data")]
#[test_case(json!({}) ; "empty body")]
fn test_cursor_malformed(body: serde_json::Value) {
    let strategy = CursorStrategy::new("pages");
    let err = strategy
        .process_response(&body, &HeaderMap::new())
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
}

#[test]
fn test_cursor_malformed_includes_graphql_errors() {
    let strategy = CursorStrategy::new("pages");
    let body = json!({"errors": [{"message": "Throttled"}]});

    let err = strategy
        .process_response(&body, &HeaderMap::new())
        .unwrap_err();
    assert!(err.to_string().contains("Throttled"));
}

#[test]
fn test_cursor_last_edge_source() {
    let strategy =
        CursorStrategy::new("transactions").with_source(CursorSource::LastEdge);
    let body = json!({
        "data": {"transactions": {
            "edges": [
                {"cursor": "c1", "node": {"id": "t1"}},
                {"cursor": "c2", "node": {"id": "t2"}}
            ]
        }}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert_eq!(page.next_token().unwrap().as_str(), "c2");

    let empty = json!({"data": {"transactions": {"edges": []}}});
    let page = strategy.process_response(&empty, &HeaderMap::new()).unwrap();
    assert!(!page.has_more());
}

#[test]
fn test_cursor_last_edge_respects_page_info_end() {
    let strategy =
        CursorStrategy::new("transactions").with_source(CursorSource::LastEdge);
    let body = json!({
        "data": {"transactions": {
            "edges": [{"cursor": "c9", "node": {"id": "t9"}}],
            "pageInfo": {"hasNextPage": false}
        }}
    });

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert!(!page.has_more());
}

// ============================================================================
// Link Header Tests
// ============================================================================

#[test]
fn test_parse_link_header_next_and_prev() {
    let header = r#"<https://x/y?page=2>; rel="next", <https://x/y?page=1>; rel="prev""#;
    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://x/y?page=2".to_string())
    );
    assert_eq!(
        parse_link_header(header, "prev"),
        Some("https://x/y?page=1".to_string())
    );
}

#[test]
fn test_parse_link_header_prev_first() {
    let header = r#"<https://shop/pages.json?page_info=p1>; rel="previous", <https://shop/pages.json?page_info=n1&limit=250>; rel="next""#;
    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://shop/pages.json?page_info=n1&limit=250".to_string())
    );
}

#[test_case(r#"<https://x/y?page=1>; rel="prev""# ; "only prev")]
#[test_case(r#"<https://x/y?page=9>; rel="nextish""# ; "rel prefix is not exact")]
#[test_case("" ; "empty")]
#[test_case("garbage" ; "no brackets")]
fn test_parse_link_header_no_next(header: &str) {
    assert_eq!(parse_link_header(header, "next"), None);
}

#[test]
fn test_parse_link_header_unquoted_and_multi_rel() {
    assert_eq!(
        parse_link_header("<https://a/b?c=1,2>; rel=next", "next"),
        Some("https://a/b?c=1,2".to_string())
    );
    assert_eq!(
        parse_link_header(r#"<https://a/last>; rel="next last""#, "next"),
        Some("https://a/last".to_string())
    );
}

#[test]
fn test_link_header_strategy_continues() {
    let strategy = LinkHeaderStrategy::new("pages");
    let body = json!({"pages": [{"id": 1}, {"id": 2}]});
    let headers = link_headers(r#"<https://x/y?page=2>; rel="next", <https://x/y?page=1>; rel="prev""#);

    let page = strategy.process_response(&body, &headers).unwrap();
    assert!(page.has_more());
    assert_eq!(page.next_token().unwrap().as_str(), "https://x/y?page=2");
    assert_eq!(page.records().len(), 2);
}

#[test]
fn test_link_header_strategy_done_without_header() {
    let strategy = LinkHeaderStrategy::new("products");
    let body = json!({"products": [{"id": 1}]});

    let page = strategy.process_response(&body, &HeaderMap::new()).unwrap();
    assert!(!page.has_more());
}

#[test]
fn test_link_header_strategy_missing_key_is_malformed() {
    let strategy = LinkHeaderStrategy::new("products");
    let err = strategy
        .process_response(&json!({"errors": "Not Found"}), &HeaderMap::new())
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
}

// ============================================================================
// Single Page Tests
// ============================================================================

#[test]
fn test_single_page_ignores_link_header() {
    let strategy = SinglePageStrategy::new("metafields");
    let body = json!({"metafields": [{"id": 10, "key": "color"}]});
    let headers = link_headers(r#"<https://x/y?page=2>; rel="next""#);

    let page = strategy.process_response(&body, &headers).unwrap();
    assert!(!page.has_more());
    assert_eq!(page.records()[0]["key"], "color");
}

#[test]
fn test_single_page_non_object_entry_is_malformed() {
    let strategy = SinglePageStrategy::new("metafields");
    let err = strategy
        .process_response(&json!({"metafields": [1, 2]}), &HeaderMap::new())
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
}
