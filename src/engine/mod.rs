//! Execution engine module
//!
//! Table-driven resource loading.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Turns a resource descriptor into a record stream and hands it to the sink
//! - `BackfillScheduler` - Window-by-window backfill, then one incremental load
//! - `ExtractionRun` / `SessionReport` - Timed outcome of every load
//!
//! One engine serves every resource in the table: graph resources page through
//! a GraphQL connection, rest resources follow `Link` headers, and fan-out
//! resources enumerate parents first and fetch one child collection each.

mod backfill;
mod types;

pub use backfill::{BackfillPlan, BackfillScheduler};
pub use types::{
    BackfillReport, BackfillState, ExtractionRun, LoadOptions, RunOutcome, SessionReport,
    SyncConfig, Watermark, WindowRun,
};

use crate::context::ShopContext;
use crate::error::{Error, Result};
use crate::fetch::{PageRequest, PaginatedFetcher};
use crate::http::{HttpClient, HttpClientConfig};
use crate::loader::{
    FanOutSource, GraphSource, ResourceDescriptor, ResourceTable, RestSource, SourceDefinition,
};
use crate::pagination::{
    lookup_path, CursorStrategy, LinkHeaderStrategy, PageStrategy, SinglePageStrategy,
};
use crate::partition::{ChildFetch, FanOutCoordinator, FanOutReport, ParentId};
use crate::sink::{Sink, SinkOutcome};
use crate::types::{ApiSurface, JsonValue, Record, RecordStream, ResourceRole};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Context and client for one API surface
#[derive(Debug, Clone)]
struct ApiTarget {
    context: Arc<ShopContext>,
    client: Arc<HttpClient>,
}

/// Sync engine for orchestrating resource loads
pub struct SyncEngine {
    admin: Option<ApiTarget>,
    partner: Option<ApiTarget>,
    sink: Arc<dyn Sink>,
    table: ResourceTable,
    config: SyncConfig,
}

/// Builder for [`SyncEngine`]
pub struct SyncEngineBuilder {
    table: ResourceTable,
    sink: Arc<dyn Sink>,
    http: HttpClientConfig,
    config: SyncConfig,
    contexts: Vec<ShopContext>,
}

impl SyncEngineBuilder {
    /// HTTP client settings shared by every surface
    #[must_use]
    pub fn http_config(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    /// Pacing settings
    #[must_use]
    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Add the context for one API surface; a later context replaces an earlier one
    #[must_use]
    pub fn context(mut self, context: ShopContext) -> Self {
        self.contexts.push(context);
        self
    }

    /// Build the engine; one HTTP client per surface
    pub fn build(self) -> Result<SyncEngine> {
        let mut admin = None;
        let mut partner = None;

        for context in self.contexts {
            let mut http = self.http.clone();
            http.default_headers
                .extend(context.headers().iter().map(|(k, v)| (k.clone(), v.clone())));
            let target = ApiTarget {
                client: Arc::new(HttpClient::try_new(http)?),
                context: Arc::new(context),
            };
            match target.context.api() {
                ApiSurface::Admin => admin = Some(target),
                ApiSurface::Partner => partner = Some(target),
            }
        }

        Ok(SyncEngine {
            admin,
            partner,
            sink: self.sink,
            table: self.table,
            config: self.config,
        })
    }
}

impl SyncEngine {
    /// Start building an engine over `table` writing to `sink`
    pub fn builder(table: ResourceTable, sink: Arc<dyn Sink>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            table,
            sink,
            http: HttpClientConfig::default(),
            config: SyncConfig::default(),
            contexts: Vec::new(),
        }
    }

    /// Resource table
    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    /// Sink
    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Pacing settings
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Check if a context for `api` was provided
    pub fn has_context(&self, api: ApiSurface) -> bool {
        self.target(api).is_ok()
    }

    /// Look up a resource
    pub fn descriptor(&self, name: &str) -> Result<&ResourceDescriptor> {
        self.table
            .get(name)
            .ok_or_else(|| Error::unknown_resource(name))
    }

    fn target(&self, api: ApiSurface) -> Result<&ApiTarget> {
        let (target, field) = match api {
            ApiSurface::Admin => (self.admin.as_ref(), "shop.shop_url"),
            ApiSurface::Partner => (self.partner.as_ref(), "partner.organization_id"),
        };
        target.ok_or_else(|| Error::missing_field(field))
    }

    // ========================================================================
    // Streams
    // ========================================================================

    /// Record stream for one resource
    ///
    /// Nothing is fetched for graph and rest resources until the stream is
    /// polled. Fan-out resources enumerate their parents here, so a parent
    /// failure surfaces as an error before any stream exists.
    pub async fn open_stream(
        &self,
        descriptor: &ResourceDescriptor,
        options: &LoadOptions,
    ) -> Result<(RecordStream, Option<FanOutReport>)> {
        let target = self.target(descriptor.api)?;

        if options.watermark.is_some() && !descriptor.supports_watermark() {
            debug!(resource = %descriptor.name, "Resource takes no watermark, ignoring it");
        }

        match &descriptor.source {
            SourceDefinition::Graph(graph) => {
                let fetcher = self.graph_fetcher(&descriptor.name, target, graph)?;
                Ok((fetcher.into_stream(), None))
            }
            SourceDefinition::Rest(rest) => {
                let fetcher = self.rest_fetcher(&descriptor.name, target, rest, options)?;
                Ok((fetcher.into_stream(), None))
            }
            SourceDefinition::FanOut(fan_out) => {
                let (stream, report) = self.fan_out(&descriptor.name, target, fan_out).await?;
                Ok((stream, Some(report)))
            }
        }
    }

    fn graph_fetcher(
        &self,
        name: &str,
        target: &ApiTarget,
        graph: &GraphSource,
    ) -> Result<PaginatedFetcher> {
        let mut variables = graph.variables.clone();
        variables.insert("first".to_string(), JsonValue::from(graph.page_size));
        for (variable, key) in &graph.bind {
            let value = target
                .context
                .binding(key)
                .ok_or_else(|| Error::missing_field(format!("shop.{key}")))?;
            variables.insert(variable.clone(), JsonValue::from(value));
        }

        let strategy = CursorStrategy::new(&graph.connection_path).with_source(graph.cursor);
        let request = PageRequest::graph(target.context.graphql_url(), &graph.query, variables);

        Ok(
            PaginatedFetcher::new(target.client.clone(), Arc::new(strategy), request)
                .with_label(name)
                .with_page_delay(self.config.page_delay),
        )
    }

    fn rest_fetcher(
        &self,
        name: &str,
        target: &ApiTarget,
        rest: &RestSource,
        options: &LoadOptions,
    ) -> Result<PaginatedFetcher> {
        let url = target.context.rest_url(&rest.path)?;

        let mut query = vec![("limit".to_string(), rest.page_size.to_string())];
        query.extend(rest.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let (Some(names), Some(watermark)) = (&rest.incremental, &options.watermark) {
            query.extend(watermark.query_params(names));
        }

        Ok(PaginatedFetcher::new(
            target.client.clone(),
            records_strategy(&rest.records_key, rest.paginate),
            PageRequest::rest(url, query),
        )
        .with_label(name)
        .with_page_delay(self.config.page_delay))
    }

    async fn fan_out(
        &self,
        name: &str,
        target: &ApiTarget,
        fan_out: &FanOutSource,
    ) -> Result<(RecordStream, FanOutReport)> {
        // Only ids are kept; parent records are dropped page by page
        let parent_key = fan_out.parent_key.as_str();
        let (ids, skipped) = self
            .rest_fetcher(
                &format!("{name}.parents"),
                target,
                &fan_out.parents,
                &LoadOptions::new(),
            )?
            .into_stream()
            .try_fold(
                (Vec::<ParentId>::new(), 0usize),
                |(mut ids, mut skipped), record| async move {
                    match ParentId::from_record(&record, parent_key) {
                        Some(id) => ids.push(id),
                        None => skipped += 1,
                    }
                    Ok((ids, skipped))
                },
            )
            .await?;

        if skipped > 0 {
            warn!(
                resource = name,
                skipped,
                key = %fan_out.parent_key,
                "Parent records without an id"
            );
        }

        let child = ChildSpec {
            client: target.client.clone(),
            context: target.context.clone(),
            source: Arc::new(fan_out.clone()),
            label: name.to_string(),
            page_delay: self.config.page_delay,
        };
        let fetch: ChildFetch = Arc::new(move |parent: &ParentId| child.stream_for(parent));

        let coordinator = FanOutCoordinator::new(name, &fan_out.foreign_key)
            .with_concurrency(self.config.fanout_concurrency)
            .with_throttle(self.config.fanout_throttle)
            .with_failure_delay(self.config.failure_delay);

        Ok(coordinator.run(ids, fetch))
    }

    // ========================================================================
    // Loads
    // ========================================================================

    /// Stream one resource into the sink
    pub async fn extract(
        &self,
        descriptor: &ResourceDescriptor,
        options: &LoadOptions,
    ) -> Result<(SinkOutcome, Option<FanOutReport>)> {
        let disposition = options.disposition.unwrap_or(descriptor.disposition);
        let (records, report) = self.open_stream(descriptor, options).await?;
        let outcome = self.sink.put(&descriptor.name, disposition, records).await?;
        Ok((outcome, report))
    }

    /// Load one resource, timing it and capturing the outcome
    ///
    /// Never fails: errors become a `Failed` run, and missing configuration
    /// becomes a `Skipped` run logged as a warning.
    pub async fn load(&self, name: &str, options: &LoadOptions) -> ExtractionRun {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(resource = name, "Starting loader");

        let (role, disposition, result) = match self.descriptor(name) {
            Ok(descriptor) => (
                descriptor.role,
                options.disposition.unwrap_or(descriptor.disposition),
                self.extract(descriptor, options).await,
            ),
            Err(e) => (
                ResourceRole::Secondary,
                options.disposition.unwrap_or_default(),
                Err(e),
            ),
        };

        let elapsed = start.elapsed();
        let elapsed_secs = elapsed.as_secs_f64();

        let outcome = match result {
            Ok((written, report)) => {
                let fan_out = report.map(|report| report.summary());
                if let Some(summary) = fan_out.as_ref().filter(|s| !s.failed_ids.is_empty()) {
                    warn!(
                        resource = name,
                        failed = summary.failed_ids.len(),
                        parents = summary.parents_total,
                        failed_ids = ?summary.failed_ids,
                        "Some parents failed"
                    );
                }
                info!(
                    resource = name,
                    records = written.records_written,
                    elapsed_secs,
                    "Loader complete"
                );
                RunOutcome::Succeeded {
                    records: written.records_written,
                    fan_out,
                }
            }
            Err(e) if e.is_missing_config() => {
                warn!(resource = name, reason = %e, "Loader skipped");
                RunOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!(resource = name, error = %e, elapsed_secs, "Loader failed");
                RunOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        ExtractionRun {
            resource: name.to_string(),
            role,
            disposition,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            outcome,
        }
    }

    /// Load `names` in order
    ///
    /// Unknown names fail before anything is fetched. A failed primary
    /// resource ends the session with `Error::ResourceFailed`; every other
    /// failure is recorded and the session moves on.
    pub async fn run_session(&self, names: &[String], options: &LoadOptions) -> Result<SessionReport> {
        for name in names {
            self.descriptor(name)?;
        }

        info!(resources = ?names, "Starting session");
        let mut report = SessionReport::default();

        for name in names {
            let run = self.load(name, options).await;
            if run.is_failed() && run.role == ResourceRole::Primary {
                let message = run.message().unwrap_or_default().to_string();
                return Err(Error::resource_failed(name, message));
            }
            report.runs.push(run);
        }

        info!(
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            records = report.total_records(),
            "Session complete"
        );
        Ok(report)
    }

    /// One cheap authenticated request; returns the shop name
    pub async fn check_connection(&self) -> Result<String> {
        let target = self.target(ApiSurface::Admin)?;
        let response = target
            .client
            .post_json(
                target.context.graphql_url(),
                serde_json::json!({ "query": SHOP_NAME_QUERY }),
            )
            .await?;

        lookup_path(&response.body, "data.shop.name")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::malformed(format!("shop query returned no shop name: {}", response.body))
            })
    }
}

const SHOP_NAME_QUERY: &str = "query { shop { name } }";

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("admin", &self.admin)
            .field("partner", &self.partner)
            .field("sink", &self.sink.name())
            .field("resources", &self.table.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Link header pagination, or one request only
fn records_strategy(records_key: &str, paginate: bool) -> Arc<dyn PageStrategy> {
    if paginate {
        Arc::new(LinkHeaderStrategy::new(records_key))
    } else {
        Arc::new(SinglePageStrategy::new(records_key))
    }
}

/// Everything a child fetch needs, owned by the fan-out closure
struct ChildSpec {
    client: Arc<HttpClient>,
    context: Arc<ShopContext>,
    source: Arc<FanOutSource>,
    label: String,
    page_delay: std::time::Duration,
}

impl ChildSpec {
    fn stream_for(&self, parent: &ParentId) -> RecordStream {
        let path = self.source.child_path_for(&parent.to_string());
        let url = match self.context.rest_url(&path) {
            Ok(url) => url,
            Err(e) => return stream::once(async move { Err::<Record, Error>(e) }).boxed(),
        };

        let query = if self.source.child_paginate {
            vec![("limit".to_string(), "250".to_string())]
        } else {
            Vec::new()
        };

        PaginatedFetcher::new(
            self.client.clone(),
            records_strategy(&self.source.child_records_key, self.source.child_paginate),
            PageRequest::rest(url, query),
        )
        .with_label(format!("{}[{parent}]", self.label))
        .with_page_delay(self.page_delay)
        .into_stream()
    }
}
