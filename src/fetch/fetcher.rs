//! Paginated fetcher implementation

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{PageResult, PageStrategy, PageToken, PaginationState};
use crate::types::{JsonObject, JsonValue, Record, RecordStream};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Request for a single page
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// GraphQL POST `{query, variables}`
    Graph {
        /// GraphQL endpoint
        url: String,
        /// Query document
        query: String,
        /// Variables; the page token goes under `after`
        variables: JsonObject,
    },
    /// REST GET
    Rest {
        /// Endpoint URL
        url: String,
        /// Query parameters of the first page
        query: Vec<(String, String)>,
    },
}

impl PageRequest {
    /// GraphQL request
    pub fn graph(url: impl Into<String>, query: impl Into<String>, variables: JsonObject) -> Self {
        Self::Graph {
            url: url.into(),
            query: query.into(),
            variables,
        }
    }

    /// REST request
    pub fn rest(url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self::Rest {
            url: url.into(),
            query,
        }
    }

    /// Request for the page named by `token`
    ///
    /// GraphQL keeps the query and sets `after`. REST replaces the whole
    /// request with the literal next URL, which already carries its params.
    #[must_use]
    pub fn with_token(&self, token: PageToken) -> Self {
        match self {
            Self::Graph {
                url,
                query,
                variables,
            } => {
                let mut variables = variables.clone();
                variables.insert("after".to_string(), JsonValue::String(token.into_inner()));
                Self::Graph {
                    url: url.clone(),
                    query: query.clone(),
                    variables,
                }
            }
            Self::Rest { .. } => Self::Rest {
                url: token.into_inner(),
                query: Vec::new(),
            },
        }
    }

    /// Target URL
    pub fn url(&self) -> &str {
        match self {
            Self::Graph { url, .. } | Self::Rest { url, .. } => url,
        }
    }
}

/// Drives one strategy against one endpoint
#[derive(Clone)]
pub struct PaginatedFetcher {
    client: Arc<HttpClient>,
    strategy: Arc<dyn PageStrategy>,
    request: PageRequest,
    label: String,
    page_delay: Duration,
}

impl PaginatedFetcher {
    /// Create a fetcher for `request`
    pub fn new(
        client: Arc<HttpClient>,
        strategy: Arc<dyn PageStrategy>,
        request: PageRequest,
    ) -> Self {
        let label = request.url().to_string();
        Self {
            client,
            strategy,
            request,
            label,
            page_delay: Duration::ZERO,
        }
    }

    /// Name used in progress logs
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Fixed sleep between consecutive pages
    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// First page request
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Perform one outbound call and extract the page
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        let response = match request {
            PageRequest::Graph {
                url,
                query,
                variables,
            } => {
                let body = serde_json::json!({
                    "query": query,
                    "variables": variables,
                });
                self.client.post_json(url, body).await?
            }
            PageRequest::Rest { url, query } => {
                let config = query
                    .iter()
                    .fold(RequestConfig::new(), |config, (k, v)| config.query(k, v));
                self.client.request_json(Method::GET, url, config).await?
            }
        };

        self.strategy
            .process_response(&response.body, &response.headers)
    }

    /// Lazy stream of every record across all pages, in server order
    ///
    /// Nothing is requested until the stream is polled. The stream ends after
    /// the page reporting no more data, and yields nothing after an error.
    pub fn into_stream(self) -> RecordStream {
        let state = FetchState {
            next: Some(self.request.clone()),
            progress: PaginationState::new(),
            fetcher: self,
        };

        let pages = stream::try_unfold(state, |mut state| async move {
            let Some(request) = state.next.take() else {
                return Ok(None);
            };

            if state.progress.pages > 0 && !state.fetcher.page_delay.is_zero() {
                tokio::time::sleep(state.fetcher.page_delay).await;
            }

            let page = state.fetcher.fetch_page(&request).await?;
            state.progress.add_page(page.records().len());

            debug!(
                resource = %state.fetcher.label,
                page = state.progress.pages,
                records = page.records().len(),
                total = state.progress.total_fetched,
                has_more = page.has_more(),
                "Fetched page"
            );

            let (records, token) = page.into_parts();
            state.next = token.map(|token| request.with_token(token));

            if state.next.is_none() {
                state.progress.mark_done();
                info!(
                    resource = %state.fetcher.label,
                    pages = state.progress.pages,
                    total = state.progress.total_fetched,
                    "Pagination complete"
                );
            }

            Ok::<_, Error>(Some((records, state)))
        });

        pages
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<Record, Error>)))
            .try_flatten()
            .boxed()
    }

    /// Drain every page into memory
    #[cfg(test)]
    pub(crate) async fn collect(self) -> Result<Vec<Record>> {
        self.into_stream().try_collect().await
    }
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("label", &self.label)
            .field("strategy", &self.strategy)
            .field("request", &self.request)
            .field("page_delay", &self.page_delay)
            .finish_non_exhaustive()
    }
}

struct FetchState {
    fetcher: PaginatedFetcher,
    next: Option<PageRequest>,
    progress: PaginationState,
}
