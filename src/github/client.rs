// GitHub API HTTP client.
// Handles authentication, conditional requests against the response cache,
// rate limit tracking, and error routing.

use std::collections::HashMap;

use reqwest::{
    Client, Method, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, IF_NONE_MATCH, USER_AGENT},
};
use serde_json::Value;

use crate::error::{BulkError, Result};

use super::cache::ResponseCache;
use super::types::RateLimit;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Soft-failure callback: receives an HTTP status error and returns the
/// substitute body the call should yield instead of propagating.
pub type ErrorHandler = Box<dyn Fn(&BulkError) -> Option<Value> + Send + Sync>;

/// GitHub API client with a shared response cache and rate limit tracking.
///
/// Not designed for concurrent calls; callers serialize access (the fetch
/// worker holds it behind a mutex, single-shot calls run on the main task).
pub struct GitHubClient {
    http: Client,
    token: Option<String>,
    cache: ResponseCache,
    rate_limit: RateLimit,
    error_handler: Option<ErrorHandler>,
}

impl GitHubClient {
    /// Create a new client, optionally with an access token.
    pub fn new(token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gh-bulk"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(BulkError::Api)?;

        Ok(Self {
            http,
            token,
            cache: ResponseCache::default(),
            rate_limit: RateLimit::default(),
            error_handler: None,
        })
    }

    /// Set the access token for subsequent calls.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Install the soft-failure handler for HTTP status errors.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    /// Get the current rate limit information.
    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    /// Make a GET call to the given endpoint.
    pub async fn get(&mut self, endpoint: &str) -> Result<Option<Value>> {
        self.call(endpoint, Method::GET, None).await
    }

    /// Issue a request and return the decoded JSON body (`None` for an
    /// empty body).
    ///
    /// Endpoints already in the cache are revalidated with `If-None-Match`;
    /// a 304 answer yields the cached body without touching the entry.
    /// Successful responses replace the cache entry for the endpoint.
    /// HTTP status errors go to the configured handler when one is set,
    /// otherwise they propagate.
    pub async fn call(
        &mut self,
        endpoint: &str,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = format!("{}{}", GITHUB_API_BASE, endpoint);
        let mut request = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|e| BulkError::Other(e.to_string()))?;
            request = request.header(AUTHORIZATION, value);
        }

        if let Some(body) = payload.filter(|p| has_body(p)) {
            request = request.json(body);
        }

        if let Some(etag) = conditional_etag(&self.cache, endpoint) {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(BulkError::Api)?;
        self.update_rate_limit(&response);

        let status = response.status();
        let headers = header_map(response.headers());
        let bytes = response.bytes().await.map_err(BulkError::Api)?;
        dispatch_response(
            endpoint,
            &url,
            status,
            headers,
            &bytes,
            &mut self.cache,
            &self.rate_limit,
            &self.error_handler,
        )
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&mut self, response: &reqwest::Response) {
        if let Some(limit) = header_u64(response, "x-ratelimit-limit") {
            self.rate_limit.limit = limit;
        }
        if let Some(remaining) = header_u64(response, "x-ratelimit-remaining") {
            self.rate_limit.remaining = remaining;
        }
        if let Some(reset) = header_u64(response, "x-ratelimit-reset") {
            self.rate_limit.reset = reset;
        }
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Collect response headers into an owned map, skipping non-UTF-8 values.
fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Handle a completed exchange: update the cache and produce the call's
/// result. Split from `call` so the dispatch is testable without a
/// transport.
///
/// 304 yields the cached body and leaves the entry untouched; a success
/// replaces the entry; an HTTP status error goes to the handler when one
/// is installed, otherwise it propagates.
#[allow(clippy::too_many_arguments)]
fn dispatch_response(
    endpoint: &str,
    url: &str,
    status: StatusCode,
    headers: HashMap<String, String>,
    body: &[u8],
    cache: &mut ResponseCache,
    rate: &RateLimit,
    handler: &Option<ErrorHandler>,
) -> Result<Option<Value>> {
    if status == StatusCode::NOT_MODIFIED {
        return Ok(cache.get(endpoint).and_then(|entry| entry.body.clone()));
    }

    if status.is_success() {
        let decoded = decode_body(body)?;
        cache.put(endpoint, headers, decoded.clone());
        return Ok(decoded);
    }

    let message = error_message(&String::from_utf8_lossy(body));
    let error = status_error(status, url, message, rate);
    match handler {
        Some(handler) if error.is_http_status() => Ok(handler(&error)),
        _ => Err(error),
    }
}

/// A payload produces a request body only when it is a non-empty mapping.
fn has_body(payload: &Value) -> bool {
    payload.as_object().is_some_and(|map| !map.is_empty())
}

/// Stored entity tag for an endpoint, if the cache has seen it.
fn conditional_etag(cache: &ResponseCache, endpoint: &str) -> Option<String> {
    cache
        .get(endpoint)
        .and_then(|entry| entry.etag())
        .map(str::to_string)
}

/// Decode a response body; an empty body decodes to `None`.
fn decode_body(bytes: &[u8]) -> Result<Option<Value>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(bytes)?))
}

/// Pull the server's `message` field out of an error body, falling back to
/// the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map an HTTP error status to a typed error.
fn status_error(status: StatusCode, url: &str, message: String, rate: &RateLimit) -> BulkError {
    match status {
        StatusCode::UNAUTHORIZED => BulkError::Unauthorized,
        StatusCode::NOT_FOUND => BulkError::NotFound(url.to_string()),
        StatusCode::FORBIDDEN if rate.remaining == 0 => {
            let reset_at = chrono::DateTime::from_timestamp(rate.reset as i64, 0)
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            BulkError::RateLimited { reset_at }
        }
        status => BulkError::Status {
            code: status.as_u16(),
            message,
        },
    }
}
