//! Loader types
//!
//! Declarative resource table types for YAML parsing.

use crate::pagination::CursorSource;
use crate::types::{ApiSurface, EndpointKind, JsonObject, ResourceRole, WriteDisposition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Resource Table
// ============================================================================

/// Every resource the engine knows how to load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTable {
    /// Resource descriptors, in declaration order
    pub resources: Vec<ResourceDescriptor>,
}

impl ResourceTable {
    /// Look up a resource by name
    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resource names, in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Resources with the given role
    pub fn with_role(&self, role: ResourceRole) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter().filter(move |r| r.role == role)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True if no resources are declared
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ============================================================================
// Resource Descriptor
// ============================================================================

/// One named resource: where it comes from and how the sink stores it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourceDescriptor {
    /// Resource name, unique per sink target
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Write disposition
    #[serde(default)]
    pub disposition: WriteDisposition,
    /// Whether failure aborts the session
    #[serde(default)]
    pub role: ResourceRole,
    /// Admin or Partner API
    #[serde(default)]
    pub api: ApiSurface,
    /// Where records come from
    pub source: SourceDefinition,
}

impl ResourceDescriptor {
    /// Endpoint kind; fan-outs read REST endpoints
    pub fn endpoint_kind(&self) -> EndpointKind {
        match self.source {
            SourceDefinition::Graph(_) => EndpointKind::Graph,
            SourceDefinition::Rest(_) | SourceDefinition::FanOut(_) => EndpointKind::Rest,
        }
    }

    /// Source kind as written in the table
    pub fn kind_name(&self) -> &'static str {
        match self.source {
            SourceDefinition::Graph(_) => "graph",
            SourceDefinition::Rest(_) => "rest",
            SourceDefinition::FanOut(_) => "fan_out",
        }
    }

    /// Whether the resource accepts a watermark
    pub fn supports_watermark(&self) -> bool {
        matches!(&self.source, SourceDefinition::Rest(rest) if rest.incremental.is_some())
    }
}

// ============================================================================
// Source Definitions
// ============================================================================

/// Source of a resource's records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDefinition {
    /// GraphQL connection
    Graph(GraphSource),
    /// REST collection
    Rest(RestSource),
    /// Per-parent REST collection
    FanOut(FanOutSource),
}

/// GraphQL connection source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GraphSource {
    /// Query document; must declare `$first` and `$after`
    pub query: String,
    /// Dot path of the connection below `data`
    pub connection_path: String,
    /// Value of the `first` variable
    #[serde(default = "default_graph_page_size")]
    pub page_size: u32,
    /// Extra static variables
    #[serde(default)]
    pub variables: JsonObject,
    /// Where the next cursor is read from
    #[serde(default)]
    pub cursor: CursorSource,
    /// Variables filled from shop bindings: variable name -> binding key
    #[serde(default)]
    pub bind: BTreeMap<String, String>,
}

/// REST collection source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RestSource {
    /// Path below the admin API base, e.g. `products.json`
    pub path: String,
    /// Body key holding the records
    pub records_key: String,
    /// Value of the `limit` parameter
    #[serde(default = "default_rest_page_size")]
    pub page_size: u32,
    /// Follow `Link` headers
    #[serde(default = "default_true")]
    pub paginate: bool,
    /// Static query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Watermark parameter names, when the endpoint filters by time
    #[serde(default)]
    pub incremental: Option<IncrementalParams>,
}

/// Query parameter names a watermark is written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IncrementalParams {
    /// Lower bound on update time
    #[serde(default = "default_updated_min")]
    pub updated_min: String,
    /// Upper bound on update time
    #[serde(default = "default_updated_max")]
    pub updated_max: String,
    /// Lower bound on creation time
    #[serde(default = "default_created_min")]
    pub created_min: String,
}

impl Default for IncrementalParams {
    fn default() -> Self {
        Self {
            updated_min: default_updated_min(),
            updated_max: default_updated_max(),
            created_min: default_created_min(),
        }
    }
}

/// Fan-out source: enumerate parents, then fetch children per parent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FanOutSource {
    /// Parent enumeration
    pub parents: RestSource,
    /// Key of the parent id in parent records
    #[serde(default = "default_parent_key")]
    pub parent_key: String,
    /// Child path template containing `{parent_id}`
    pub child_path: String,
    /// Body key holding child records
    #[serde(default = "default_child_records_key")]
    pub child_records_key: String,
    /// Field the parent id is written to on each child
    pub foreign_key: String,
    /// Follow `Link` headers on child requests
    #[serde(default)]
    pub child_paginate: bool,
}

impl FanOutSource {
    /// Child path for one parent
    pub fn child_path_for(&self, parent_id: &str) -> String {
        self.child_path.replace("{parent_id}", parent_id)
    }
}

fn default_graph_page_size() -> u32 {
    100
}

fn default_rest_page_size() -> u32 {
    250
}

fn default_true() -> bool {
    true
}

fn default_updated_min() -> String {
    "updated_at_min".to_string()
}

fn default_updated_max() -> String {
    "updated_at_max".to_string()
}

fn default_created_min() -> String {
    "created_at_min".to_string()
}

fn default_parent_key() -> String {
    "id".to_string()
}

fn default_child_records_key() -> String {
    "metafields".to_string()
}
