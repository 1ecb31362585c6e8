//! Partition module
//!
//! Supports: parent fan-out, date-range windows
//!
//! # Overview
//!
//! Partitions split one resource into many sub-queries:
//! - Child resources that require a parent ID (metafields per page/product)
//! - Date range windows for historical backfill

mod fanout;
mod types;
mod windows;

pub use fanout::{ChildFetch, FanOutCoordinator, MAX_FANOUT_CONCURRENCY};
pub use types::{with_foreign_key, FanOutReport, FanOutSummary, ParentId};
pub use windows::{
    format_timestamp, parse_datetime, parse_duration, parse_std_duration, BackfillWindow,
    WindowPlanner,
};
