//! Shared HTTP client helpers for the document source and the summarizer.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;

use crate::error::ConfigError;

/// Maximum length of an upstream error body kept in messages.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Default connect timeout for outbound requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser-like user agent; some publishers reject unknown clients.
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; layscience/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Creates an HTTP client that follows redirects and enforces `timeout` on
/// the whole request.
pub fn create_http_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Truncates an upstream error body so it can be stored and logged.
pub fn truncate_error_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

/// Reads a `Retry-After` header given in seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
