//! Shop context
//!
//! The pre-resolved authorization context every request is made against:
//! a base URL, the header map carrying the access token, and the shop
//! specific bindings some queries need (e.g. the inventory location).
//!
//! A context is built once per API surface and shared read-only.

use crate::config::{PartnerSettings, ShopSettings};
use crate::error::{Error, Result};
use crate::types::{ApiSurface, OptionStringExt, StringMap};
use url::Url;

/// Header carrying the access token on both APIs
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Binding key for the inventory location global id
pub const INVENTORY_LOCATION_BINDING: &str = "inventory_location_id";

/// Base URL, headers and bindings for one API surface
#[derive(Clone)]
pub struct ShopContext {
    api: ApiSurface,
    base_url: Url,
    graphql_url: Url,
    headers: StringMap,
    bindings: StringMap,
}

impl ShopContext {
    /// Context from an already resolved base URL and header map
    ///
    /// The base URL is treated as a directory: a missing trailing `/` is added
    /// so relative REST paths resolve below it.
    pub fn new(api: ApiSurface, base_url: &str, headers: StringMap) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let graphql_url = base_url.join("graphql.json")?;

        Ok(Self {
            api,
            base_url,
            graphql_url,
            headers,
            bindings: StringMap::new(),
        })
    }

    /// Admin API context: `https://{shop}/admin/api/{version}/`
    pub fn admin(shop_url: &str, api_version: &str, access_token: &str) -> Result<Self> {
        let host = normalize_shop_url(shop_url)?;
        let version = require("shop.api_version", api_version)?;
        let token = require("shop.access_token", access_token)?;

        Self::new(
            ApiSurface::Admin,
            &format!("https://{host}/admin/api/{version}/"),
            token_headers(token),
        )
    }

    /// Partner API context: `https://partners.shopify.com/{org}/api/{version}/`
    pub fn partner(organization_id: &str, api_version: &str, access_token: &str) -> Result<Self> {
        let org = require("partner.organization_id", organization_id)?;
        if !org.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_value(
                "partner.organization_id",
                format!("'{org}' is not an organization id"),
            ));
        }
        let version = require("partner.api_version", api_version)?;
        let token = require("partner.access_token", access_token)?;

        Self::new(
            ApiSurface::Partner,
            &format!("https://partners.shopify.com/{org}/api/{version}/"),
            token_headers(token),
        )
    }

    /// Pre-flight: build the admin context, or report the missing field
    pub fn from_shop_settings(settings: &ShopSettings) -> Result<Self> {
        let shop_url = settings
            .shop_url
            .clone()
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("shop.shop_url"))?;
        let token = settings
            .access_token
            .clone()
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("shop.access_token"))?;

        let mut context = Self::admin(&shop_url, &settings.api_version, &token)?;
        if let Some(location) = settings.inventory_location_id.clone().none_if_empty() {
            context = context.with_binding(INVENTORY_LOCATION_BINDING, location);
        }
        Ok(context)
    }

    /// Pre-flight: build the partner context, or report the missing field
    pub fn from_partner_settings(settings: &PartnerSettings) -> Result<Self> {
        let org = settings
            .organization_id
            .clone()
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("partner.organization_id"))?;
        let token = settings
            .access_token
            .clone()
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("partner.access_token"))?;

        Self::partner(&org, &settings.api_version, &token)
    }

    /// Add a query binding
    #[must_use]
    pub fn with_binding(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(key.into(), value.into());
        self
    }

    /// API surface this context talks to
    pub fn api(&self) -> ApiSurface {
        self.api
    }

    /// Base URL, always ending in `/`
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// GraphQL endpoint below the base URL
    pub fn graphql_url(&self) -> &str {
        self.graphql_url.as_str()
    }

    /// REST endpoint for `path` below the base URL
    pub fn rest_url(&self, path: &str) -> Result<String> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?.to_string())
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &StringMap {
        &self.headers
    }

    /// Look up a binding
    pub fn binding(&self, key: &str) -> Option<&str> {
        self.bindings.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for ShopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut header_names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        header_names.sort_unstable();
        f.debug_struct("ShopContext")
            .field("api", &self.api)
            .field("base_url", &self.base_url.as_str())
            .field("headers", &header_names)
            .field("bindings", &self.bindings)
            .finish()
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::missing_field(field));
    }
    Ok(value)
}

fn token_headers(token: &str) -> StringMap {
    let mut headers = StringMap::new();
    headers.insert(ACCESS_TOKEN_HEADER.to_string(), token.to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

// ============================================================================
// URL Normalization
// ============================================================================

/// Reduce a configured shop URL to its bare host
///
/// Removes one exact `https://` or `http://` prefix and any trailing `/`.
/// Anything left that is not a plain host (empty input, a path, whitespace,
/// a port, or a host the `url` crate rejects) is `Error::InvalidShopUrl`.
pub fn normalize_shop_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme.trim_end_matches('/');

    if host.is_empty() {
        return Err(Error::invalid_shop_url(input, "no host"));
    }
    if host.contains('/') {
        return Err(Error::invalid_shop_url(input, "expected a host without a path"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(Error::invalid_shop_url(input, "host contains whitespace"));
    }

    let parsed = Url::parse(&format!("https://{host}/"))
        .map_err(|e| Error::invalid_shop_url(input, e.to_string()))?;
    match parsed.host_str() {
        Some(parsed_host) if parsed_host.eq_ignore_ascii_case(host) => {
            Ok(parsed_host.to_string())
        }
        _ => Err(Error::invalid_shop_url(input, "not a valid host")),
    }
}
