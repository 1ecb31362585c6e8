//! YAML parser for resource tables
//!
//! Parses and validates resource tables. Supports the built-in table
//! embedded in the binary and custom YAML files.

use crate::error::{Error, Result};
use crate::loader::types::{ResourceDescriptor, ResourceTable, SourceDefinition};
use crate::resources;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load the built-in resource table
pub fn load_builtin_resources() -> Result<ResourceTable> {
    load_resources_from_str(resources::BUILTIN_RESOURCES)
}

/// Load a resource table from a YAML file
pub fn load_resources(path: impl AsRef<Path>) -> Result<ResourceTable> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read resource file '{}': {e}",
            path.display()
        ))
    })?;
    load_resources_from_str(&content)
}

/// Load a resource table from a YAML string
pub fn load_resources_from_str(yaml: &str) -> Result<ResourceTable> {
    let table: ResourceTable = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse resource YAML: {e}")))?;

    validate_table(&table)?;
    Ok(table)
}

/// Validate a resource table
fn validate_table(table: &ResourceTable) -> Result<()> {
    if table.resources.is_empty() {
        return Err(Error::config("Resource table must have at least one resource"));
    }

    let mut names = HashSet::new();
    for resource in &table.resources {
        if !names.insert(resource.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate resource name: {}",
                resource.name
            )));
        }
        validate_resource(resource)?;
    }

    Ok(())
}

/// Validate a single resource
fn validate_resource(resource: &ResourceDescriptor) -> Result<()> {
    let name = &resource.name;
    if name.is_empty() {
        return Err(Error::config("Resource name cannot be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::config(format!(
            "Resource name '{name}' may only contain letters, digits and '_'"
        )));
    }

    match &resource.source {
        SourceDefinition::Graph(graph) => {
            if graph.query.trim().is_empty() {
                return Err(Error::config(format!("Resource '{name}' has an empty query")));
            }
            if graph.connection_path.is_empty() {
                return Err(Error::config(format!(
                    "Resource '{name}' needs a connection_path"
                )));
            }
            if graph.page_size == 0 {
                return Err(Error::config(format!("Resource '{name}' page_size must be > 0")));
            }
        }
        SourceDefinition::Rest(rest) => validate_rest(name, rest)?,
        SourceDefinition::FanOut(fan_out) => {
            validate_rest(name, &fan_out.parents)?;
            if !fan_out.child_path.contains("{parent_id}") {
                return Err(Error::config(format!(
                    "Resource '{name}' child_path must contain {{parent_id}}"
                )));
            }
            if fan_out.foreign_key.is_empty() {
                return Err(Error::config(format!(
                    "Resource '{name}' needs a foreign_key"
                )));
            }
        }
    }

    Ok(())
}

fn validate_rest(name: &str, rest: &crate::loader::types::RestSource) -> Result<()> {
    if rest.path.is_empty() {
        return Err(Error::config(format!("Resource '{name}' path cannot be empty")));
    }
    if rest.records_key.is_empty() {
        return Err(Error::config(format!(
            "Resource '{name}' records_key cannot be empty"
        )));
    }
    if rest.page_size == 0 {
        return Err(Error::config(format!("Resource '{name}' page_size must be > 0")));
    }
    Ok(())
}
