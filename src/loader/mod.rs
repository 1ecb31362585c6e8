//! YAML Loader module
//!
//! Parse resource tables from YAML.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ResourceTable` - Every loadable resource, in declaration order
//! - `ResourceDescriptor` - Name, disposition, role and source of one resource
//! - YAML parsing with validation

mod parser;
mod types;

pub use parser::{load_builtin_resources, load_resources, load_resources_from_str};
pub use types::{
    FanOutSource, GraphSource, IncrementalParams, ResourceDescriptor, ResourceTable, RestSource,
    SourceDefinition,
};

#[cfg(test)]
mod tests;
