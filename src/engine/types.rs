//! Engine types
//!
//! Load options, run outcomes and reports for the sync engine.

use crate::config::HttpSettings;
use crate::error::Result;
use crate::loader::IncrementalParams;
use crate::partition::{format_timestamp, BackfillWindow, FanOutSummary};
use crate::types::{ResourceRole, WriteDisposition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

// ============================================================================
// Sync Config
// ============================================================================

/// Pacing for one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Sleep between consecutive pages of a resource
    pub page_delay: Duration,
    /// Sleep after each fan-out parent
    pub fanout_throttle: Duration,
    /// Sleep after an isolated fan-out failure
    pub failure_delay: Duration,
    /// Fan-out parents fetched at once
    pub fanout_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_delay: Duration::ZERO,
            fanout_throttle: Duration::from_millis(500),
            failure_delay: Duration::from_secs(2),
            fanout_concurrency: 1,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive from HTTP settings
    pub fn from_settings(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            page_delay: http.page_delay()?,
            fanout_throttle: http.fanout_throttle()?,
            failure_delay: http.failure_delay()?,
            fanout_concurrency: http.fanout_concurrency,
        })
    }

    /// Set the inter-page delay
    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Set the fan-out throttle
    #[must_use]
    pub fn with_fanout_throttle(mut self, throttle: Duration) -> Self {
        self.fanout_throttle = throttle;
        self
    }

    /// Set the fan-out failure delay
    #[must_use]
    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Set fan-out concurrency
    #[must_use]
    pub fn with_fanout_concurrency(mut self, concurrency: usize) -> Self {
        self.fanout_concurrency = concurrency;
        self
    }

    /// No sleeps at all; for tests
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            page_delay: Duration::ZERO,
            fanout_throttle: Duration::ZERO,
            failure_delay: Duration::ZERO,
            fanout_concurrency: 1,
        }
    }
}

// ============================================================================
// Watermark
// ============================================================================

/// Time bounds pushed down to REST endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Watermark {
    /// Records updated at or after
    pub updated_at_min: Option<DateTime<Utc>>,
    /// Records updated before
    pub updated_at_max: Option<DateTime<Utc>>,
    /// Records created at or after
    pub created_at_min: Option<DateTime<Utc>>,
}

impl Watermark {
    /// Empty watermark
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of one backfill window, plus a fixed creation floor
    ///
    /// `updated_at_max` is inclusive and Shopify timestamps have whole
    /// seconds, so the upper bound is one second before the window end.
    /// A record updated exactly on a boundary lands in the later window only.
    pub fn for_window(window: &BackfillWindow, created_at_min: DateTime<Utc>) -> Self {
        Self {
            updated_at_min: Some(window.start),
            updated_at_max: Some(window.end - chrono::Duration::seconds(1)),
            created_at_min: Some(created_at_min),
        }
    }

    /// Set the lower update bound
    #[must_use]
    pub fn updated_since(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at_min = Some(at);
        self
    }

    /// Set the upper update bound
    #[must_use]
    pub fn updated_before(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at_max = Some(at);
        self
    }

    /// Set the creation floor
    #[must_use]
    pub fn created_since(mut self, at: DateTime<Utc>) -> Self {
        self.created_at_min = Some(at);
        self
    }

    /// True if no bound is set
    pub fn is_empty(&self) -> bool {
        self.updated_at_min.is_none() && self.updated_at_max.is_none() && self.created_at_min.is_none()
    }

    /// Query parameters under the endpoint's parameter names
    pub fn query_params(&self, names: &IncrementalParams) -> Vec<(String, String)> {
        [
            (&names.updated_min, self.updated_at_min),
            (&names.updated_max, self.updated_at_max),
            (&names.created_min, self.created_at_min),
        ]
        .into_iter()
        .filter_map(|(name, at)| at.map(|at| (name.clone(), format_timestamp(at))))
        .collect()
    }
}

// ============================================================================
// Load Options
// ============================================================================

/// Per-call overrides for one resource load
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Time bounds, for resources that accept them
    pub watermark: Option<Watermark>,
    /// Disposition instead of the declared one
    pub disposition: Option<WriteDisposition>,
}

impl LoadOptions {
    /// Defaults: declared disposition, no watermark
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the watermark
    #[must_use]
    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = (!watermark.is_empty()).then_some(watermark);
        self
    }

    /// Override the disposition
    #[must_use]
    pub fn with_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.disposition = Some(disposition);
        self
    }
}

// ============================================================================
// Extraction Run
// ============================================================================

/// How one resource load ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Records were written
    Succeeded {
        /// Records handed to the sink
        records: u64,
        /// Parent accounting for fan-out resources
        #[serde(skip_serializing_if = "Option::is_none")]
        fan_out: Option<FanOutSummary>,
    },
    /// Not attempted; configuration was missing
    Skipped {
        /// Why
        reason: String,
    },
    /// Attempted and failed
    Failed {
        /// Error message
        error: String,
    },
}

/// One resource load, from entry to exit
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRun {
    /// Resource name
    pub resource: String,
    /// Declared role
    pub role: ResourceRole,
    /// Disposition used
    pub disposition: WriteDisposition,
    /// Wall clock start
    pub started_at: DateTime<Utc>,
    /// Elapsed milliseconds
    pub elapsed_ms: u64,
    /// Outcome
    pub outcome: RunOutcome,
}

impl ExtractionRun {
    /// Elapsed time
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Records written; zero unless succeeded
    pub fn records(&self) -> u64 {
        match &self.outcome {
            RunOutcome::Succeeded { records, .. } => *records,
            _ => 0,
        }
    }

    /// Check if the load succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }

    /// Check if the load was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, RunOutcome::Skipped { .. })
    }

    /// Check if the load failed
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    /// Error message of a failed or skipped run
    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Failed { error } => Some(error),
            RunOutcome::Skipped { reason } => Some(reason),
            RunOutcome::Succeeded { .. } => None,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Every run of one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    /// Runs in execution order
    pub runs: Vec<ExtractionRun>,
}

impl SessionReport {
    /// Run for `resource`
    pub fn run(&self, resource: &str) -> Option<&ExtractionRun> {
        self.runs.iter().find(|run| run.resource == resource)
    }

    /// Number of successful runs
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|run| run.is_success()).count()
    }

    /// Number of skipped runs
    pub fn skipped(&self) -> usize {
        self.runs.iter().filter(|run| run.is_skipped()).count()
    }

    /// Number of failed runs
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|run| run.is_failed()).count()
    }

    /// Records written across all runs
    pub fn total_records(&self) -> u64 {
        self.runs.iter().map(ExtractionRun::records).sum()
    }
}

/// Backfill scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "window", rename_all = "snake_case")]
pub enum BackfillState {
    /// Nothing run yet
    Pending,
    /// Window `i` in flight
    Running(usize),
    /// Window `i` done
    Completed(usize),
    /// Window `i` failed; nothing further runs
    Aborted(usize),
    /// All windows and the incremental load ran
    Finished,
}

/// One backfill window and its run
#[derive(Debug, Clone, Serialize)]
pub struct WindowRun {
    /// Window bounds
    pub window: BackfillWindow,
    /// The window's load
    pub run: ExtractionRun,
}

/// What a backfill did
#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    /// Windows attempted, ascending
    pub windows: Vec<WindowRun>,
    /// Incremental load after the windows; absent when aborted
    pub incremental: Option<ExtractionRun>,
    /// State transitions, in order
    pub states: Vec<BackfillState>,
}

impl BackfillReport {
    /// Final state
    pub fn final_state(&self) -> BackfillState {
        self.states.last().copied().unwrap_or(BackfillState::Pending)
    }

    /// Window index the backfill stopped at, if it failed
    pub fn aborted_at(&self) -> Option<usize> {
        match self.final_state() {
            BackfillState::Aborted(index) => Some(index),
            _ => None,
        }
    }

    /// Records written by windows and the incremental load
    pub fn total_records(&self) -> u64 {
        self.windows.iter().map(|w| w.run.records()).sum::<u64>()
            + self.incremental.as_ref().map_or(0, ExtractionRun::records)
    }
}
