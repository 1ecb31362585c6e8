//! Paginated fetcher module
//!
//! Drives one page strategy to exhaustion against one endpoint and exposes
//! the result as a lazy record stream.
//!
//! # Overview
//!
//! - `PageRequest` - the request for one page, rebuilt from each page token
//! - `PaginatedFetcher` - one outbound call per page, records in server order

mod fetcher;

pub use fetcher::{PageRequest, PaginatedFetcher};
