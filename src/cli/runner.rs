//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{Settings, SinkKind, SyncSettings};
use crate::context::ShopContext;
use crate::engine::{
    BackfillPlan, BackfillScheduler, LoadOptions, SyncConfig, SyncEngine, Watermark,
};
use crate::error::{Error, Result};
use crate::loader::{load_resources, ResourceTable};
use crate::partition::parse_datetime;
use crate::resources::{builtin_table, is_builtin, PARTNER_TRANSACTIONS};
use crate::sink::{open_sink, MemorySink, Sink};
use crate::types::ResourceRole;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                start_date,
                end_date,
            } => {
                self.run_all(start_date.as_deref(), end_date.as_deref())
                    .await
            }
            Commands::Load {
                resources,
                start_date,
                end_date,
            } => {
                self.load(resources, start_date.as_deref(), end_date.as_deref())
                    .await
            }
            Commands::Backfill {
                resource,
                incremental_resource,
                start_date,
                window,
            } => {
                let mut settings = self.settings()?;
                if let Some(resource) = resource {
                    settings.backfill.resource.clone_from(resource);
                }
                if let Some(resource) = incremental_resource {
                    settings.backfill.incremental_resource = Some(resource.clone());
                }
                if let Some(start) = start_date {
                    settings.backfill.start_date.clone_from(start);
                }
                if let Some(window) = window {
                    settings.backfill.window.clone_from(window);
                }
                settings.validate()?;
                self.backfill(&settings).await
            }
            Commands::Resources => self.resources(),
            Commands::Check => self.check().await,
            Commands::PartnerTransactions => self.partner_transactions().await,
        }
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Settings file (or defaults), then environment, then flags
    fn settings(&self) -> Result<Settings> {
        let settings = match &self.cli.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        let mut settings = settings.with_env();

        if let Some(kind) = self.cli.sink {
            settings.sink.kind = kind;
        }
        if let Some(path) = &self.cli.sink_path {
            settings.sink.path.clone_from(path);
        }
        if self.cli.dry_run {
            settings.sink.kind = SinkKind::Memory;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Resource table from `--resources`, or the built-in one
    fn table(&self) -> Result<ResourceTable> {
        match &self.cli.resource_table {
            Some(path) => load_resources(path),
            None => builtin_table(),
        }
    }

    /// Engine over the configured sink
    fn engine(&self, settings: &Settings) -> Result<SyncEngine> {
        let sink = open_sink(&settings.sink)?;
        info!(sink = sink.name(), kind = ?settings.sink.kind, "Sink opened");
        self.engine_with_sink(settings, sink)
    }

    fn engine_with_sink(&self, settings: &Settings, sink: Arc<dyn Sink>) -> Result<SyncEngine> {
        let mut builder = SyncEngine::builder(self.table()?, sink)
            .http_config(settings.http.client_config()?)
            .sync_config(SyncConfig::from_settings(&settings.http)?);

        for context in contexts(settings)? {
            builder = builder.context(context);
        }
        builder.build()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Load primaries, then secondaries
    async fn run_all(&self, start_date: Option<&str>, end_date: Option<&str>) -> Result<()> {
        let settings = self.settings()?;
        let engine = self.engine(&settings)?;

        let names: Vec<String> = settings
            .sync
            .resources
            .iter()
            .chain(&settings.sync.secondary)
            .cloned()
            .collect();
        let options = LoadOptions::new().with_watermark(session_watermark(
            &settings.sync,
            start_date,
            end_date,
        )?);

        let report = engine.run_session(&names, &options).await?;
        self.output_message(&json!({
            "type": "SESSION_REPORT",
            "report": report,
        }));
        Ok(())
    }

    /// Load the named resources
    async fn load(
        &self,
        names: &[String],
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<()> {
        let settings = self.settings()?;
        let engine = self.engine(&settings)?;
        let options = LoadOptions::new().with_watermark(session_watermark(
            &settings.sync,
            start_date,
            end_date,
        )?);

        let report = engine.run_session(names, &options).await?;
        self.output_message(&json!({
            "type": "SESSION_REPORT",
            "report": report,
        }));
        Ok(())
    }

    /// Windowed backfill, then the incremental load
    async fn backfill(&self, settings: &Settings) -> Result<()> {
        let engine = self.engine(settings)?;
        let plan = BackfillPlan::from_settings(&settings.backfill)?;
        let resource = plan.resource().to_string();

        let report = BackfillScheduler::new(&engine, plan).run().await?;
        self.output_message(&json!({
            "type": "BACKFILL_REPORT",
            "report": report,
        }));

        if let Some(index) = report.aborted_at() {
            let message = report
                .windows
                .get(index)
                .and_then(|w| w.run.message())
                .unwrap_or("window failed");
            return Err(Error::resource_failed(
                resource,
                format!("backfill aborted at window {}: {message}", index + 1),
            ));
        }
        if let Some(run) = report.incremental.as_ref().filter(|run| run.is_failed()) {
            return Err(Error::resource_failed(
                &run.resource,
                run.message().unwrap_or("incremental load failed"),
            ));
        }
        Ok(())
    }

    /// List the resource table
    fn resources(&self) -> Result<()> {
        let table = self.table()?;
        self.output_message(&resource_listing(&table));
        Ok(())
    }

    /// Pre-flight checks, then one request against the shop
    async fn check(&self) -> Result<()> {
        let settings = self.settings()?;
        self.table()?;
        // Missing credentials are an error here, not a skip
        ShopContext::from_shop_settings(&settings.shop)?;

        // Nothing is written, so the configured sink is left untouched
        let engine = self.engine_with_sink(&settings, Arc::new(MemorySink::new()))?;

        match engine.check_connection().await {
            Ok(shop) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": format!("Connected to {shop}")
                    }
                }));
                Ok(())
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
                Err(e)
            }
        }
    }

    /// Load the Partner API transactions
    async fn partner_transactions(&self) -> Result<()> {
        let settings = self.settings()?;
        ShopContext::from_partner_settings(&settings.partner)?;
        let engine = self.engine(&settings)?;

        let run = engine
            .load(PARTNER_TRANSACTIONS, &LoadOptions::new())
            .await;
        self.output_message(&json!({
            "type": "EXTRACTION_RUN",
            "run": run,
        }));

        if run.is_success() {
            Ok(())
        } else {
            Err(Error::resource_failed(
                PARTNER_TRANSACTIONS,
                run.message().unwrap_or("load did not run"),
            ))
        }
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Every context the settings can build
///
/// Missing credentials leave that surface out, and its resources are then
/// skipped at load time. Credentials that are present but wrong fail here.
fn contexts(settings: &Settings) -> Result<Vec<ShopContext>> {
    let mut contexts = Vec::new();
    for (api, context) in [
        ("admin", ShopContext::from_shop_settings(&settings.shop)),
        ("partner", ShopContext::from_partner_settings(&settings.partner)),
    ] {
        match context {
            Ok(context) => contexts.push(context),
            Err(e) if e.is_missing_config() => debug!(api, error = %e, "No context"),
            Err(e) => return Err(e),
        }
    }
    Ok(contexts)
}

/// `RESOURCES` message for a table
fn resource_listing(table: &ResourceTable) -> Value {
    let resources: Vec<Value> = table
        .resources
        .iter()
        .map(|descriptor| {
            json!({
                "name": descriptor.name,
                "kind": descriptor.kind_name(),
                "role": descriptor.role,
                "api": descriptor.api,
                "disposition": descriptor.disposition,
                "watermark": descriptor.supports_watermark(),
                "builtin": is_builtin(&descriptor.name),
                "description": descriptor.description,
            })
        })
        .collect();
    let primary: Vec<&str> = table
        .with_role(ResourceRole::Primary)
        .map(|descriptor| descriptor.name.as_str())
        .collect();

    json!({
        "type": "RESOURCES",
        "resources": resources,
        "primary": primary,
    })
}

/// Update bounds from flags, falling back to the sync settings
fn session_watermark(
    sync: &SyncSettings,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Watermark> {
    let mut watermark = Watermark::new();
    if let Some(start) = start_date.or(sync.start_date.as_deref()) {
        watermark = watermark.updated_since(parse_datetime(start)?);
    }
    if let Some(end) = end_date.or(sync.end_date.as_deref()) {
        watermark = watermark.updated_before(parse_datetime(end)?);
    }
    Ok(watermark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShopSettings;
    use crate::types::ApiSurface;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn runner(args: &[&str]) -> Runner {
        let mut argv = vec!["shopify-sync"];
        argv.extend_from_slice(args);
        Runner::new(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_settings_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sink:\n  kind: jsonl\n  path: from-file").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let settings = runner(&["--config", path.as_str(), "--sink-path", "elsewhere", "resources"])
            .settings()
            .unwrap();
        assert_eq!(settings.sink.kind, SinkKind::Jsonl);
        assert_eq!(settings.sink.path, std::path::PathBuf::from("elsewhere"));

        let settings = runner(&["--config", path.as_str(), "--dry-run", "resources"])
            .settings()
            .unwrap();
        assert_eq!(settings.sink.kind, SinkKind::Memory);
    }

    #[test]
    fn test_settings_missing_file_is_error() {
        let result = runner(&["--config", "/nonexistent/settings.yaml", "resources"]).settings();
        assert!(result.is_err());
    }

    #[test]
    fn test_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "resources:\n  - name: only\n    source:\n      kind: rest\n      path: only.json\n      records_key: only"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let table = runner(&["--resources", path.as_str(), "resources"]).table().unwrap();
        assert_eq!(table.names(), vec!["only"]);

        let builtin = runner(&["resources"]).table().unwrap();
        assert!(builtin.get(PARTNER_TRANSACTIONS).is_some());
    }

    #[test]
    fn test_contexts_skip_missing_credentials() {
        let mut settings = Settings::default();
        assert!(contexts(&settings).unwrap().is_empty());

        settings.shop = ShopSettings {
            shop_url: Some("demo.myshopify.com".into()),
            access_token: Some("token".into()),
            ..ShopSettings::default()
        };
        let built = contexts(&settings).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].api(), ApiSurface::Admin);

        settings.shop.shop_url = Some("demo.myshopify.com/admin".into());
        assert!(contexts(&settings).is_err());
    }

    #[test]
    fn test_session_watermark_flags_win() {
        let sync = SyncSettings {
            start_date: Some("2025-01-01".into()),
            end_date: Some("2025-02-01".into()),
            ..SyncSettings::default()
        };

        let watermark = session_watermark(&sync, Some("2025-01-15"), None).unwrap();
        assert_eq!(
            watermark.updated_at_min,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            watermark.updated_at_max,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(watermark.created_at_min, None);

        let empty = session_watermark(&SyncSettings::default(), None, None).unwrap();
        assert!(empty.is_empty());

        assert!(session_watermark(&sync, Some("not a date"), None).is_err());
    }

    #[test]
    fn test_resource_listing_marks_builtin_and_primary() {
        let listing = resource_listing(&builtin_table().unwrap());
        assert_eq!(listing["primary"], json!(["products", "orders", "customers"]));
        assert_eq!(listing["resources"][0]["builtin"], json!(true));
        assert_eq!(listing["resources"][0]["watermark"], json!(true));

        let custom = crate::loader::load_resources_from_str(
            "resources:\n  - name: gift_cards\n    role: primary\n    source:\n      kind: rest\n      path: gift_cards.json\n      records_key: gift_cards",
        )
        .unwrap();
        let listing = resource_listing(&custom);
        assert_eq!(listing["primary"], json!(["gift_cards"]));
        assert_eq!(listing["resources"][0]["builtin"], json!(false));
    }

    #[tokio::test]
    async fn test_resources_command_needs_no_settings() {
        runner(&["resources"]).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_without_credentials_fails() {
        let err = runner(&["check"]).check().await.unwrap_err();
        assert!(err.is_missing_config());
    }
}
