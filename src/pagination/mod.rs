//! Pagination module
//!
//! Supports: GraphQL cursor connections, REST Link headers, single page
//!
//! # Overview
//!
//! A strategy looks at one response and answers two questions: which records
//! it carried and how to ask for the next page. The fetcher owns the loop.

mod strategies;
mod types;

pub use strategies::{
    parse_link_header, CursorSource, CursorStrategy, LinkHeaderStrategy, SinglePageStrategy,
};
pub use types::{lookup_path, PageResult, PageStrategy, PageToken, PaginationState};

#[cfg(test)]
mod tests;
