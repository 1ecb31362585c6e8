//! Fan-out coordinator
//!
//! Runs one child fetch per parent and merges the results into a single
//! record stream. A failure on one parent never stops its siblings.

use super::types::{with_foreign_key, FanOutReport, ParentId};
use crate::error::Error;
use crate::types::{Record, RecordStream};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on concurrent parent fetches
pub const MAX_FANOUT_CONCURRENCY: usize = 8;

/// Child fetch for one parent
pub type ChildFetch = Arc<dyn Fn(&ParentId) -> RecordStream + Send + Sync>;

/// Fan-out coordinator configuration and driver
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
    label: String,
    foreign_key: String,
    concurrency: usize,
    throttle: Duration,
    failure_delay: Duration,
}

impl FanOutCoordinator {
    /// Coordinator tagging child records with `foreign_key`
    pub fn new(label: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            foreign_key: foreign_key.into(),
            concurrency: 1,
            throttle: Duration::ZERO,
            failure_delay: Duration::ZERO,
        }
    }

    /// Parents fetched at once, clamped to `1..=MAX_FANOUT_CONCURRENCY`
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_FANOUT_CONCURRENCY);
        self
    }

    /// Fixed sleep after each parent's fetch
    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sleep after an isolated parent failure
    #[must_use]
    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Effective concurrency
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fan out over `parents`
    ///
    /// Parent order is kept in the output even with concurrency above one,
    /// and each parent's children are collected before they are released,
    /// so at most `concurrency` parents' children are held at once.
    /// Transport and status errors skip the parent; anything else ends the
    /// stream with that error. Duplicate parent ids are fetched once.
    pub fn run(&self, parents: Vec<ParentId>, fetch: ChildFetch) -> (RecordStream, FanOutReport) {
        let mut seen = HashSet::new();
        let parents: Vec<ParentId> = parents
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();

        let report = FanOutReport::new(parents.len());

        if parents.is_empty() {
            warn!(resource = %self.label, "No parents to fan out over");
            return (stream::empty().boxed(), report);
        }

        debug!(
            resource = %self.label,
            parents = parents.len(),
            concurrency = self.concurrency,
            "Starting fan-out"
        );

        let this = self.clone();
        let job_report = report.clone();
        let jobs = parents.into_iter().map(move |parent| {
            let fetch = Arc::clone(&fetch);
            let this = this.clone();
            let report = job_report.clone();
            async move { this.run_parent(parent, fetch, report).await }
        });

        let records = stream::iter(jobs)
            .buffered(self.concurrency)
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<Record, Error>)))
            .try_flatten()
            .boxed();

        (records, report)
    }

    async fn run_parent(
        &self,
        parent: ParentId,
        fetch: ChildFetch,
        report: FanOutReport,
    ) -> Result<Vec<Record>, Error> {
        let result: Result<Vec<Record>, Error> = (*fetch)(&parent).try_collect().await;

        match result {
            Ok(children) => {
                report.record_success(children.len());
                debug!(
                    resource = %self.label,
                    parent_id = %parent,
                    records = children.len(),
                    "Fetched children"
                );
                if !self.throttle.is_zero() {
                    tokio::time::sleep(self.throttle).await;
                }
                Ok(children
                    .into_iter()
                    .map(|record| with_foreign_key(record, &self.foreign_key, &parent))
                    .collect())
            }
            Err(e) if e.is_isolable() => {
                warn!(
                    resource = %self.label,
                    parent_id = %parent,
                    error = %e,
                    "Child fetch failed, skipping parent"
                );
                report.record_failure(&parent);
                if !self.failure_delay.is_zero() {
                    tokio::time::sleep(self.failure_delay).await;
                }
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
