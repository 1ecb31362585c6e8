//! Windowed backfill
//!
//! Splits `[start, now)` into fixed-width windows, loads one resource window
//! by window in ascending order, then switches to one incremental load
//! anchored at `now`.
//!
//! ```text
//! PENDING -> RUNNING(0) -> COMPLETED(0) -> RUNNING(1) -> ... -> FINISHED
//!                 \                            \
//!                  -> ABORTED(0)                -> ABORTED(1)
//! ```

use super::types::{
    BackfillReport, BackfillState, ExtractionRun, LoadOptions, Watermark, WindowRun,
};
use super::SyncEngine;
use crate::config::BackfillSettings;
use crate::error::{Error, Result};
use crate::partition::{parse_datetime, parse_duration, BackfillWindow, WindowPlanner};
use crate::types::WriteDisposition;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

/// What to backfill and over which range
#[derive(Debug, Clone)]
pub struct BackfillPlan {
    resource: String,
    incremental_resource: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    width: Duration,
}

impl BackfillPlan {
    /// Backfill `resource` from `start` until now in windows of `width`
    pub fn new(resource: impl Into<String>, start: DateTime<Utc>, width: Duration) -> Self {
        let resource = resource.into();
        Self {
            incremental_resource: resource.clone(),
            resource,
            start,
            end: Utc::now(),
            width,
        }
    }

    /// Plan from settings, ending now
    pub fn from_settings(settings: &BackfillSettings) -> Result<Self> {
        let start = parse_datetime(&settings.start_date)?;
        let width = parse_duration(&settings.window)?;
        Ok(Self::new(&settings.resource, start, width)
            .with_incremental_resource(settings.incremental_target()))
    }

    /// End the last window at `end` instead of now
    #[must_use]
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }

    /// Run the final incremental load on another resource
    #[must_use]
    pub fn with_incremental_resource(mut self, resource: impl Into<String>) -> Self {
        self.incremental_resource = resource.into();
        self
    }

    /// Resource loaded window by window
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Resource given the incremental load
    pub fn incremental_resource(&self) -> &str {
        &self.incremental_resource
    }

    /// First window start; also the creation floor of every load
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Upper bound of the last window; the incremental load's anchor
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Windows covering `[start, end)`
    pub fn windows(&self) -> Result<Vec<BackfillWindow>> {
        Ok(WindowPlanner::new(self.start, self.end, self.width)?.windows())
    }
}

/// Drives one backfill plan against an engine
#[derive(Debug)]
pub struct BackfillScheduler<'a> {
    engine: &'a SyncEngine,
    plan: BackfillPlan,
    state: BackfillState,
    history: Vec<BackfillState>,
}

impl<'a> BackfillScheduler<'a> {
    /// Scheduler in `Pending`
    pub fn new(engine: &'a SyncEngine, plan: BackfillPlan) -> Self {
        Self {
            engine,
            plan,
            state: BackfillState::Pending,
            history: vec![BackfillState::Pending],
        }
    }

    /// Current state
    pub fn state(&self) -> BackfillState {
        self.state
    }

    fn transition(&mut self, next: BackfillState) {
        debug!(from = ?self.state, to = ?next, "Backfill state");
        self.state = next;
        self.history.push(next);
    }

    /// Check both resources exist and take a watermark
    fn validate(&self) -> Result<()> {
        for name in [self.plan.resource(), self.plan.incremental_resource()] {
            let descriptor = self.engine.descriptor(name)?;
            if !descriptor.supports_watermark() {
                return Err(Error::config(format!(
                    "Resource '{name}' cannot be backfilled: it takes no watermark"
                )));
            }
        }
        Ok(())
    }

    /// Run every window, then the incremental load
    ///
    /// A failed window aborts the backfill: later windows and the incremental
    /// load are not run, and the report's final state is `Aborted(i)`.
    pub async fn run(mut self) -> Result<BackfillReport> {
        self.validate()?;

        let windows = self.plan.windows()?;
        let total = windows.len();
        let created_floor = self.plan.start();
        let mut runs = Vec::with_capacity(total);

        if windows.is_empty() {
            info!(resource = self.plan.resource(), "Nothing to backfill");
        } else {
            info!(
                resource = self.plan.resource(),
                windows = total,
                "Starting backfill"
            );
        }

        for (index, window) in windows.into_iter().enumerate() {
            self.transition(BackfillState::Running(index));
            info!(
                resource = self.plan.resource(),
                window = index + 1,
                of = total,
                range = %window,
                "Backfill window"
            );

            let options = LoadOptions::new()
                .with_disposition(WriteDisposition::Incremental)
                .with_watermark(Watermark::for_window(&window, created_floor));
            let run = self.engine.load(self.plan.resource(), &options).await;
            let succeeded = run.is_success();
            runs.push(WindowRun { window, run });

            if !succeeded {
                self.transition(BackfillState::Aborted(index));
                error!(
                    resource = self.plan.resource(),
                    window = index + 1,
                    range = %window,
                    "Backfill aborted"
                );
                return Ok(self.report(runs, None));
            }
            self.transition(BackfillState::Completed(index));
        }

        info!(
            resource = self.plan.incremental_resource(),
            since = %self.plan.end(),
            "Switching to incremental load"
        );
        let options = LoadOptions::new()
            .with_disposition(WriteDisposition::Incremental)
            .with_watermark(
                Watermark::new()
                    .updated_since(self.plan.end())
                    .created_since(created_floor),
            );
        let incremental = self
            .engine
            .load(self.plan.incremental_resource(), &options)
            .await;

        self.transition(BackfillState::Finished);
        Ok(self.report(runs, Some(incremental)))
    }

    fn report(self, windows: Vec<WindowRun>, incremental: Option<ExtractionRun>) -> BackfillReport {
        BackfillReport {
            windows,
            incremental,
            states: self.history,
        }
    }
}
