//! HTTP client module
//!
//! Provides the HTTP client every outbound call goes through.
//!
//! # Features
//!
//! - **Transport Retry**: One retry after a fixed delay on connect errors and timeouts
//! - **Rate Limiting**: Token bucket rate limiter using governor, shared by all workers
//! - **Status Errors**: 4xx/5xx responses surface as `Error::HttpStatus` with the body

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, JsonResponse, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
