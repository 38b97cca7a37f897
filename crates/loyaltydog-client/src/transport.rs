//! # HTTP Transport
//!
//! Thin request/response layer under the LoyaltyDog API client.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One Upstream Call                                │
//! │                                                                         │
//! │  HttpRequest ──► RestClient::send ──► reqwest (timeout 30 s)           │
//! │                                            │                            │
//! │                          ┌─────────────────┴─────────────────┐          │
//! │                          ▼                                   ▼          │
//! │                 got a status line                     never answered    │
//! │           HttpResponse { error: false,          HttpResponse { error:   │
//! │             status, body, elapsed }               true, status: 0,      │
//! │                                                   body: Error: "..." -  │
//! │                                                   Code: N }             │
//! │                                                                         │
//! │  send() never fails and never retries: callers decide what a status    │
//! │  means.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## TLS
//! Certificates are verified unless `accept_invalid_certs = true`, which
//! logs a warning every time a client is built.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{mask_secret, ApiSettings};
use crate::error::{ClientError, ClientResult};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
        }
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Sent as a JSON body when present.
    pub payload: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            payload: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post(url: impl Into<String>, payload: Value) -> Self {
        HttpRequest {
            method: HttpMethod::Post,
            payload: Some(payload),
            ..HttpRequest::get(url)
        }
    }

    pub fn put(url: impl Into<String>, payload: Value) -> Self {
        HttpRequest {
            method: HttpMethod::Put,
            ..HttpRequest::post(url, payload)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// True when no HTTP response was received.
    pub error: bool,
    /// HTTP status, 0 when `error` is set.
    pub status: u16,
    /// Raw body, or the synthetic error body on transport failure.
    pub body: String,
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            error: false,
            status,
            body: body.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Response for a request that never got an answer.
    pub fn transport_failure(message: &str, code: u32, elapsed: Duration) -> Self {
        HttpResponse {
            error: true,
            status: 0,
            body: format!("Error: \"{message}\" - Code: {code}"),
            elapsed,
        }
    }

    /// Returns the body when the call succeeded with `expected`.
    pub fn expect_status(self, expected: u16) -> ClientResult<String> {
        if self.error {
            return Err(ClientError::Transport(self.body));
        }
        if self.status != expected {
            return Err(ClientError::UpstreamStatus {
                expected,
                actual: self.status,
                body: self.body,
            });
        }
        Ok(self.body)
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Sends requests. Implementations never retry and never panic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> HttpResponse;
}

// =============================================================================
// reqwest Implementation
// =============================================================================

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    timeout: Duration,
    verifies_tls: bool,
}

impl RestClient {
    /// Builds a client from the API settings.
    pub fn new(settings: &ApiSettings) -> ClientResult<Self> {
        let timeout = settings.timeout();
        if settings.accept_invalid_certs {
            warn!(
                url = %settings.url,
                "TLS certificate verification is DISABLED for LoyaltyDog API calls"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(RestClient {
            client,
            timeout,
            verifies_tls: !settings.accept_invalid_certs,
        })
    }

    /// Whether server certificates are checked.
    pub fn verifies_tls(&self) -> bool {
        self.verifies_tls
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> HttpResponse {
        self.send(with_headers(HttpRequest::get(uri), headers).with_timeout(self.timeout))
            .await
    }

    pub async fn post(&self, uri: &str, payload: Value, headers: &[(&str, &str)]) -> HttpResponse {
        self.send(with_headers(HttpRequest::post(uri, payload), headers).with_timeout(self.timeout))
            .await
    }

    pub async fn put(&self, uri: &str, payload: Value, headers: &[(&str, &str)]) -> HttpResponse {
        self.send(with_headers(HttpRequest::put(uri, payload), headers).with_timeout(self.timeout))
            .await
    }
}

fn with_headers(request: HttpRequest, headers: &[(&str, &str)]) -> HttpRequest {
    headers
        .iter()
        .fold(request, |req, (name, value)| req.header(*name, *value))
}

/// Error codes follow libcurl numbering.
fn transport_error_code(err: &reqwest::Error) -> u32 {
    if err.is_timeout() {
        28
    } else if err.is_connect() {
        7
    } else if err.is_builder() {
        3
    } else {
        0
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn send(&self, request: HttpRequest) -> HttpResponse {
        debug!(method = %request.method, url = %request.url, "Sending request");
        for (name, value) in &request.headers {
            let shown = if name.eq_ignore_ascii_case("authorization") {
                mask_secret(value)
            } else {
                value.clone()
            };
            debug!(header = %name, value = %shown, "Request header");
        }
        if let Some(payload) = &request.payload {
            debug!(payload = %payload, "Request payload");
        }

        let started = Instant::now();
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let failure =
                    HttpResponse::transport_failure(&err.to_string(), transport_error_code(&err), started.elapsed());
                debug!(body = %failure.body, "Request failed");
                return failure;
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                let elapsed = started.elapsed();
                debug!(status, elapsed_ms = elapsed.as_millis() as u64, "Received response");
                HttpResponse {
                    error: false,
                    status,
                    body,
                    elapsed,
                }
            }
            Err(err) => {
                let failure =
                    HttpResponse::transport_failure(&err.to_string(), transport_error_code(&err), started.elapsed());
                debug!(body = %failure.body, "Failed to read response body");
                failure
            }
        }
    }
}
