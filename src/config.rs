//! Runtime settings
//!
//! Settings come from an optional YAML file, then environment overrides,
//! then CLI flags. Every section has defaults, so an empty file is valid.
//!
//! ```yaml
//! shop:
//!   shop_url: demo.myshopify.com
//!   access_token: shpat_...
//! sync:
//!   start_date: "2025-10-10"
//! backfill:
//!   resource: customers
//!   incremental_resource: orders
//!   window: 7d
//! sink:
//!   kind: duckdb
//!   path: shopify.duckdb
//! ```

use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::partition::{parse_datetime, parse_duration, parse_std_duration};
use crate::types::OptionStringExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `shop.shop_url`
pub const ENV_SHOP_URL: &str = "SHOPIFY_SHOP_URL";
/// Environment variable overriding `shop.access_token`
pub const ENV_ACCESS_TOKEN: &str = "SHOPIFY_ACCESS_TOKEN";
/// Environment variable overriding `partner.organization_id`
pub const ENV_PARTNER_ORG_ID: &str = "SHOPIFY_PARTNER_ORG_ID";
/// Environment variable overriding `partner.access_token`
pub const ENV_PARTNER_TOKEN: &str = "SHOPIFY_PARTNER_TOKEN";

const DEFAULT_API_VERSION: &str = "2024-01";

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Admin API credentials and shop bindings
    pub shop: ShopSettings,
    /// HTTP behaviour
    pub http: HttpSettings,
    /// Which resources a `run` loads
    pub sync: SyncSettings,
    /// Windowed backfill
    pub backfill: BackfillSettings,
    /// Where records go
    pub sink: SinkSettings,
    /// Partner API credentials
    pub partner: PartnerSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML; an empty document yields defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).none_if_empty();

        if let Some(url) = get(ENV_SHOP_URL) {
            self.shop.shop_url = Some(url);
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.shop.access_token = Some(token);
        }
        if let Some(org) = get(ENV_PARTNER_ORG_ID) {
            self.partner.organization_id = Some(org);
        }
        if let Some(token) = get(ENV_PARTNER_TOKEN) {
            self.partner.access_token = Some(token);
        }
        self
    }

    /// Check every value that is parsed lazily
    pub fn validate(&self) -> Result<()> {
        self.http.timeout()?;
        self.http.retry_delay()?;
        self.http.page_delay()?;
        self.http.fanout_throttle()?;
        self.http.failure_delay()?;
        if self.http.requests_per_second == 0 {
            return Err(Error::invalid_value(
                "http.requests_per_second",
                "must be greater than zero",
            ));
        }

        if let Some(start) = &self.sync.start_date {
            parse_datetime(start)?;
        }
        if let Some(end) = &self.sync.end_date {
            parse_datetime(end)?;
        }

        parse_datetime(&self.backfill.start_date)?;
        if parse_duration(&self.backfill.window)? <= chrono::Duration::zero() {
            return Err(Error::invalid_value("backfill.window", "must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Admin API credentials and shop specific values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopSettings {
    /// Shop host, with or without scheme
    pub shop_url: Option<String>,
    /// Admin API access token
    pub access_token: Option<String>,
    /// Admin API version
    pub api_version: String,
    /// Location global id for `inventory_levels`
    pub inventory_location_id: Option<String>,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            shop_url: None,
            access_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            inventory_location_id: None,
        }
    }
}

/// HTTP client and pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request deadline
    pub timeout: String,
    /// Sleep before the single transport retry
    pub retry_delay: String,
    /// Sleep between consecutive pages of one resource
    pub page_delay: String,
    /// Sleep after each fan-out parent
    pub fanout_throttle: String,
    /// Sleep after an isolated fan-out failure
    pub failure_delay: String,
    /// Token bucket refill rate
    pub requests_per_second: u32,
    /// Token bucket size
    pub burst: u32,
    /// Parents fetched at once
    pub fanout_concurrency: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: "30s".to_string(),
            retry_delay: "1s".to_string(),
            page_delay: "0s".to_string(),
            fanout_throttle: "500ms".to_string(),
            failure_delay: "2s".to_string(),
            requests_per_second: 2,
            burst: 40,
            fanout_concurrency: 1,
        }
    }
}

impl HttpSettings {
    /// Per-request deadline
    pub fn timeout(&self) -> Result<Duration> {
        field_duration("http.timeout", &self.timeout)
    }

    /// Transport retry delay
    pub fn retry_delay(&self) -> Result<Duration> {
        field_duration("http.retry_delay", &self.retry_delay)
    }

    /// Inter-page delay
    pub fn page_delay(&self) -> Result<Duration> {
        field_duration("http.page_delay", &self.page_delay)
    }

    /// Fan-out throttle
    pub fn fanout_throttle(&self) -> Result<Duration> {
        field_duration("http.fanout_throttle", &self.fanout_throttle)
    }

    /// Fan-out failure delay
    pub fn failure_delay(&self) -> Result<Duration> {
        field_duration("http.failure_delay", &self.failure_delay)
    }

    /// HTTP client configuration derived from these settings
    pub fn client_config(&self) -> Result<HttpClientConfig> {
        Ok(HttpClientConfig::builder()
            .timeout(self.timeout()?)
            .transport_retry(1, self.retry_delay()?)
            .rate_limit(RateLimiterConfig::new(self.requests_per_second, self.burst))
            .build())
    }
}

fn field_duration(field: &str, value: &str) -> Result<Duration> {
    parse_std_duration(value).map_err(|e| Error::invalid_value(field, e.to_string()))
}

/// Resources loaded by `run`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Primary resources
    pub resources: Vec<String>,
    /// Secondary resources run after the primaries
    pub secondary: Vec<String>,
    /// Lower watermark for primary resources
    pub start_date: Option<String>,
    /// Upper watermark for primary resources
    pub end_date: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            resources: vec![
                "products".to_string(),
                "orders".to_string(),
                "customers".to_string(),
            ],
            secondary: [
                "pages",
                "pages_metafields",
                "collections_metafields",
                "products_metafields",
                "blogs",
                "articles",
                "inventory_levels",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            start_date: None,
            end_date: None,
        }
    }
}

/// Windowed backfill settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillSettings {
    /// Resource loaded window by window
    pub resource: String,
    /// Resource given the final incremental load; defaults to `resource`
    pub incremental_resource: Option<String>,
    /// First window start
    pub start_date: String,
    /// Window width, e.g. `7d` or `1w`
    pub window: String,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            resource: "customers".to_string(),
            incremental_resource: None,
            start_date: "2025-10-01".to_string(),
            window: "7d".to_string(),
        }
    }
}

impl BackfillSettings {
    /// Resource receiving the final incremental load
    pub fn incremental_target(&self) -> &str {
        self.incremental_resource
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.resource)
    }
}

/// Sink kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// DuckDB database file
    #[default]
    Duckdb,
    /// In-process only, nothing persisted
    Memory,
    /// One JSON Lines file per resource
    Jsonl,
}

/// Sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Sink kind
    pub kind: SinkKind,
    /// Database file or output directory
    pub path: PathBuf,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::Duckdb,
            path: PathBuf::from("shopify.duckdb"),
        }
    }
}

/// Partner API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerSettings {
    /// Partner organization id
    pub organization_id: Option<String>,
    /// Partner API access token
    pub access_token: Option<String>,
    /// Partner API version
    pub api_version: String,
}

impl Default for PartnerSettings {
    fn default() -> Self {
        Self {
            organization_id: None,
            access_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.shop.api_version, "2024-01");
        assert_eq!(settings.sync.resources, vec!["products", "orders", "customers"]);
        assert_eq!(settings.sync.secondary.len(), 7);
        assert_eq!(settings.backfill.window, "7d");
        assert_eq!(settings.backfill.incremental_target(), "customers");
        assert_eq!(settings.sink.kind, SinkKind::Duckdb);
        assert_eq!(settings.http.timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.http.fanout_throttle().unwrap(), Duration::from_millis(500));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let settings = Settings::from_yaml("  \n").unwrap();
        assert_eq!(settings.backfill.start_date, "2025-10-01");
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
shop:
  shop_url: demo.myshopify.com
backfill:
  incremental_resource: orders
  window: 1w
sink:
  kind: jsonl
  path: out
http:
  fanout_concurrency: 4
"#;
        let settings = Settings::from_yaml(yaml).unwrap();

        assert_eq!(settings.shop.shop_url.as_deref(), Some("demo.myshopify.com"));
        assert_eq!(settings.shop.api_version, "2024-01");
        assert_eq!(settings.backfill.resource, "customers");
        assert_eq!(settings.backfill.incremental_target(), "orders");
        assert_eq!(settings.sink.kind, SinkKind::Jsonl);
        assert_eq!(settings.sink.path, PathBuf::from("out"));
        assert_eq!(settings.http.fanout_concurrency, 4);
        assert_eq!(settings.http.burst, 40);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_yaml("http:\n  timeout: soon\n").is_err());
        assert!(Settings::from_yaml("backfill:\n  window: 0d\n").is_err());
        assert!(Settings::from_yaml("sync:\n  start_date: yesterday\n").is_err());
        assert!(Settings::from_yaml("http:\n  requests_per_second: 0\n").is_err());
        assert!(Settings::from_yaml("sink:\n  kind: s3\n").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SHOP_URL, "https://env-shop.myshopify.com"),
            (ENV_ACCESS_TOKEN, "env-token"),
            (ENV_PARTNER_ORG_ID, ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.partner.organization_id = Some("from-file".into());
        let settings = settings.with_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            settings.shop.shop_url.as_deref(),
            Some("https://env-shop.myshopify.com")
        );
        assert_eq!(settings.shop.access_token.as_deref(), Some("env-token"));
        // Empty values do not override
        assert_eq!(settings.partner.organization_id.as_deref(), Some("from-file"));
        assert_eq!(settings.partner.access_token, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "sync:\n  resources: [orders]\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.sync.resources, vec!["orders"]);

        let err = Settings::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }

    #[test]
    fn test_client_config() {
        let config = HttpSettings::default().client_config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.transport_retries, 1);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(2, 40)));
    }
}
