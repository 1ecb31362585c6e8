//! Built-in resource table embedded in the binary
//!
//! The table lives in `resources/shopify.yaml` and is compiled in, so a plain
//! `shopify-sync run` needs no resource file. `--resources FILE` replaces it.

use crate::error::Result;
use crate::loader::{load_builtin_resources, ResourceTable};
use std::sync::LazyLock;

/// Partner API transactions resource
pub const PARTNER_TRANSACTIONS: &str = "partner_transactions";

/// Built-in resource table YAML
pub static BUILTIN_RESOURCES: &str = include_str!("../resources/shopify.yaml");

/// Parsed built-in table, validated once
static BUILTIN_TABLE: LazyLock<std::result::Result<ResourceTable, String>> =
    LazyLock::new(|| load_builtin_resources().map_err(|e| e.to_string()));

/// Get the built-in resource table
pub fn builtin_table() -> Result<ResourceTable> {
    BUILTIN_TABLE
        .as_ref()
        .cloned()
        .map_err(|message| crate::error::Error::config(message.clone()))
}

/// Check if a resource name is built in
pub fn is_builtin(name: &str) -> bool {
    builtin_table().is_ok_and(|table| table.get(name).is_some())
}
