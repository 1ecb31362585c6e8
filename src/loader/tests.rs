//! Tests for YAML loader module

use super::*;
use crate::pagination::CursorSource;
use crate::types::{ApiSurface, EndpointKind, ResourceRole, WriteDisposition};
use pretty_assertions::assert_eq;
use test_case::test_case;

// ============================================================================
// Basic Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_rest_resource() {
    let yaml = r#"
resources:
  - name: products
    source:
      kind: rest
      path: products.json
      records_key: products
"#;

    let table = load_resources_from_str(yaml).unwrap();
    let products = table.get("products").unwrap();

    assert_eq!(products.disposition, WriteDisposition::Replace);
    assert_eq!(products.role, ResourceRole::Secondary);
    assert_eq!(products.api, ApiSurface::Admin);
    assert_eq!(products.endpoint_kind(), EndpointKind::Rest);
    assert!(!products.supports_watermark());

    match &products.source {
        SourceDefinition::Rest(rest) => {
            assert_eq!(rest.page_size, 250);
            assert!(rest.paginate);
            assert!(rest.params.is_empty());
        }
        other => panic!("expected rest source, got {other:?}"),
    }
}

#[test]
fn test_load_graph_resource_with_bindings() {
    let yaml = r#"
resources:
  - name: inventory_levels
    disposition: append
    source:
      kind: graph
      connection_path: location.inventoryLevels
      query: "query Q($locationId: ID!, $first: Int!, $after: String) { x }"
      bind:
        locationId: inventory_location_id
      variables:
        includeInactive: false
"#;

    let table = load_resources_from_str(yaml).unwrap();
    let resource = table.get("inventory_levels").unwrap();
    assert_eq!(resource.disposition, WriteDisposition::Append);
    assert_eq!(resource.endpoint_kind(), EndpointKind::Graph);

    let SourceDefinition::Graph(graph) = &resource.source else {
        panic!("expected graph source");
    };
    assert_eq!(graph.page_size, 100);
    assert_eq!(graph.cursor, CursorSource::PageInfo);
    assert_eq!(
        graph.bind.get("locationId").map(String::as_str),
        Some("inventory_location_id")
    );
    assert_eq!(graph.variables["includeInactive"], serde_json::json!(false));
}

#[test]
fn test_load_fan_out_defaults() {
    let yaml = r#"
resources:
  - name: pages_metafields
    source:
      kind: fan_out
      parents:
        path: pages.json
        records_key: pages
      child_path: "pages/{parent_id}/metafields.json"
      foreign_key: page_id
"#;

    let table = load_resources_from_str(yaml).unwrap();
    let SourceDefinition::FanOut(fan_out) = &table.get("pages_metafields").unwrap().source else {
        panic!("expected fan-out source");
    };

    assert_eq!(fan_out.parent_key, "id");
    assert_eq!(fan_out.child_records_key, "metafields");
    assert!(!fan_out.child_paginate);
    assert_eq!(fan_out.child_path_for("42"), "pages/42/metafields.json");
}

#[test]
fn test_incremental_params_defaults() {
    let yaml = r#"
resources:
  - name: customers
    source:
      kind: rest
      path: customers.json
      records_key: customers
      incremental: {}
"#;

    let table = load_resources_from_str(yaml).unwrap();
    let customers = table.get("customers").unwrap();
    assert!(customers.supports_watermark());

    let SourceDefinition::Rest(rest) = &customers.source else {
        panic!("expected rest source");
    };
    assert_eq!(rest.incremental, Some(IncrementalParams::default()));
    assert_eq!(rest.incremental.as_ref().unwrap().created_min, "created_at_min");
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test_case("resources: []" ; "empty table")]
#[test_case(r#"
resources:
  - name: a
    source: {kind: rest, path: a.json, records_key: a}
  - name: a
    source: {kind: rest, path: b.json, records_key: b}
"# ; "duplicate names")]
#[test_case(r#"
resources:
  - name: bad-name
    source: {kind: rest, path: a.json, records_key: a}
"# ; "invalid name")]
#[test_case(r#"
resources:
  - name: a
    source: {kind: rest, path: "", records_key: a}
"# ; "empty path")]
#[test_case(r#"
resources:
  - name: a
    source: {kind: graph, query: " ", connection_path: pages}
"# ; "empty query")]
#[test_case(r#"
resources:
  - name: a
    source:
      kind: fan_out
      parents: {path: pages.json, records_key: pages}
      child_path: pages/metafields.json
      foreign_key: page_id
"# ; "child path without placeholder")]
#[test_case(r#"
resources:
  - name: a
    source: {kind: soap, path: a.json}
"# ; "unknown kind")]
fn test_invalid_tables(yaml: &str) {
    assert!(load_resources_from_str(yaml).is_err());
}

#[test]
fn test_load_resources_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resources.yaml");
    std::fs::write(
        &path,
        "resources:\n  - name: shop\n    source: {kind: rest, path: shop.json, records_key: shop}\n",
    )
    .unwrap();

    let table = load_resources(&path).unwrap();
    assert_eq!(table.names(), vec!["shop"]);

    assert!(load_resources(dir.path().join("missing.yaml")).is_err());
}

// ============================================================================
// Built-in Table Tests
// ============================================================================

#[test]
fn test_builtin_table_resources() {
    let table = load_builtin_resources().unwrap();

    assert_eq!(
        table.names(),
        vec![
            "products",
            "orders",
            "customers",
            "pages",
            "blogs",
            "articles",
            "inventory_levels",
            "pages_metafields",
            "collections_metafields",
            "products_metafields",
            "partner_transactions",
        ]
    );

    let primary: Vec<_> = table
        .with_role(ResourceRole::Primary)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(primary, vec!["products", "orders", "customers"]);
}

#[test]
fn test_builtin_orders_any_status() {
    let table = load_builtin_resources().unwrap();
    let SourceDefinition::Rest(orders) = &table.get("orders").unwrap().source else {
        panic!("expected rest source");
    };
    assert_eq!(orders.params.get("status").map(String::as_str), Some("any"));
}

#[test]
fn test_builtin_collections_parents_single_shot() {
    let table = load_builtin_resources().unwrap();
    let SourceDefinition::FanOut(fan_out) = &table.get("collections_metafields").unwrap().source
    else {
        panic!("expected fan-out source");
    };
    assert!(!fan_out.parents.paginate);
    assert_eq!(fan_out.foreign_key, "collection_id");
    assert_eq!(
        fan_out.child_path_for("7"),
        "collections/7/metafields.json"
    );
}

#[test]
fn test_builtin_partner_transactions() {
    let table = load_builtin_resources().unwrap();
    let resource = table.get("partner_transactions").unwrap();

    assert_eq!(resource.api, ApiSurface::Partner);
    assert_eq!(resource.disposition, WriteDisposition::Append);
    let SourceDefinition::Graph(graph) = &resource.source else {
        panic!("expected graph source");
    };
    assert_eq!(graph.cursor, CursorSource::LastEdge);
}

#[test]
fn test_builtin_helpers() {
    assert!(crate::resources::is_builtin("pages_metafields"));
    assert!(!crate::resources::is_builtin("gift_cards"));
}
