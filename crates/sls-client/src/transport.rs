// crates/sls-client/src/transport.rs
// ============================================================================
// Module: Transport
// Description: Bounded blocking HTTP transport for signed requests.
// Purpose: Issue one request, read the full response, never raise on I/O.
// Dependencies: reqwest, serde, url
// ============================================================================

//! ## Overview
//! [`Transport`] is the seam between the operation facade and the network.
//! [`HttpTransport`] uses a blocking reqwest client with these properties:
//! - separate connect and read timeouts;
//! - redirects disabled;
//! - a hard cap on response size;
//! - optional per-host address pinning.
//!
//! Every I/O failure is captured into [`ResponseEnvelope::error`], and there
//! are no retries.
//!
//! URL construction lives here as well. Log-query endpoints
//! (`/logstores/{name}/logs`) emit their parameters in a fixed priority order
//! because the backend parser is sensitive to it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use url::form_urlencoded;

use crate::error::ClientError;
use crate::request::CONTENT_TYPE;
use crate::request::HttpMethod;
use crate::request::QueryParams;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default read timeout in milliseconds; log queries can be slow.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 15_000;
/// Default response size cap in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
/// Parameter order required by `/logstores/{name}/logs`.
pub const LOG_QUERY_PARAM_ORDER: [&str; 7] =
    ["from", "to", "topic", "query", "line", "offset", "reverse"];

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// URL scheme used to reach the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlScheme {
    /// TLS (default).
    #[default]
    Https,
    /// Cleartext, for local fixtures and proxies only.
    Http,
}

impl UrlScheme {
    /// Returns the scheme label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// Transport configuration.
///
/// # Invariants
/// - `read_timeout_ms` bounds the full request lifecycle, body included.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `host_overrides` pin a host to a socket address, port included.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Maximum response size in bytes.
    pub max_response_bytes: usize,
    /// URL scheme.
    pub scheme: UrlScheme,
    /// User agent for outbound requests.
    pub user_agent: String,
    /// Fixed host-to-address pins.
    pub host_overrides: BTreeMap<String, SocketAddr>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            scheme: UrlScheme::Https,
            user_agent: "sls-mcp/0.1".to_string(),
            host_overrides: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Fully assembled request ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL including the encoded query string.
    pub url: String,
    /// Headers including `Authorization`.
    pub headers: Vec<(String, String)>,
    /// Body bytes, written for POST only.
    pub body: Option<Vec<u8>>,
}

/// Raw transport result.
///
/// # Invariants
/// - `error` is set only for transport failures, never for HTTP error statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope {
    /// HTTP status code, 0 when no response was received.
    pub status_code: u16,
    /// Response body decoded as UTF-8 (lossy).
    pub body: String,
    /// Response headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Transport failure description.
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Builds an envelope for a received response.
    #[must_use]
    pub fn received(
        status_code: u16,
        body: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers,
            error: None,
        }
    }

    /// Builds an envelope for a transport failure.
    #[must_use]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            body: String::new(),
            headers: BTreeMap::new(),
            error: Some(message.into()),
        }
    }

    /// Returns true for statuses in `[200, 300)` without a transport error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    /// Returns a header value by lower-cased name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sends assembled requests.
pub trait Transport: Send + Sync {
    /// Sends a request and reports the outcome as an envelope.
    fn send(&self, request: &OutboundRequest) -> ResponseEnvelope;

    /// Returns the scheme used for request URLs.
    fn scheme(&self) -> UrlScheme {
        UrlScheme::Https
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Blocking reqwest transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Transport configuration.
    config: TransportConfig,
    /// Shared connection-pooling client.
    client: Client,
}

impl HttpTransport {
    /// Builds a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the HTTP client cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let client = build_http_client(&config)?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Applies host pins to the request URL port.
    fn pinned_url(&self, raw: &str) -> Result<Url, String> {
        let mut url = Url::parse(raw).map_err(|err| format!("invalid request url: {err}"))?;
        let pinned_port = url
            .host_str()
            .and_then(|host| self.config.host_overrides.get(host))
            .map(SocketAddr::port);
        if let Some(port) = pinned_port {
            url.set_port(Some(port)).map_err(|()| "invalid request url port".to_string())?;
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> ResponseEnvelope {
        let url = match self.pinned_url(&request.url) {
            Ok(url) => url,
            Err(message) => return ResponseEnvelope::transport_failure(message),
        };
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header("Accept", CONTENT_TYPE);
        if request.method == HttpMethod::Post
            && let Some(body) = &request.body
        {
            builder = builder.body(body.clone());
        }
        let mut response = match builder.send() {
            Ok(response) => response,
            Err(err) => return ResponseEnvelope::transport_failure(describe_send_error(&err)),
        };
        let status_code = response.status().as_u16();
        let headers = collect_headers(&response);
        match read_response_limited(&mut response, self.config.max_response_bytes) {
            Ok(bytes) => {
                ResponseEnvelope::received(status_code, String::from_utf8_lossy(&bytes), headers)
            }
            Err(message) => ResponseEnvelope::transport_failure(message),
        }
    }

    fn scheme(&self) -> UrlScheme {
        self.config.scheme
    }
}

// ============================================================================
// SECTION: URL Construction
// ============================================================================

/// Builds the absolute request URL.
#[must_use]
pub fn build_url(
    scheme: UrlScheme,
    authority: &str,
    resource_path: &str,
    query: &QueryParams,
) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in ordered_query(resource_path, query) {
        serializer.append_pair(key, value);
    }
    let encoded = serializer.finish();
    if encoded.is_empty() {
        format!("{}://{authority}{resource_path}", scheme.as_str())
    } else {
        format!("{}://{authority}{resource_path}?{encoded}", scheme.as_str())
    }
}

/// Returns parameters in wire order for the given path.
#[must_use]
pub fn ordered_query<'a>(resource_path: &str, query: &'a QueryParams) -> Vec<(&'a str, &'a str)> {
    if !is_log_query_path(resource_path) {
        return query.iter().collect();
    }
    let mut ordered = Vec::with_capacity(query.len());
    for key in LOG_QUERY_PARAM_ORDER {
        if let Some(entry) = query.iter().find(|(name, _)| *name == key) {
            ordered.push(entry);
        }
    }
    ordered.extend(query.iter().filter(|(name, _)| !LOG_QUERY_PARAM_ORDER.contains(name)));
    ordered
}

/// Returns true for `/logstores/{name}/logs`.
#[must_use]
pub fn is_log_query_path(resource_path: &str) -> bool {
    resource_path
        .strip_prefix("/logstores/")
        .and_then(|rest| rest.strip_suffix("/logs"))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the pooled HTTP client.
fn build_http_client(config: &TransportConfig) -> Result<Client, ClientError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none());
    for (host, addr) in &config.host_overrides {
        builder = builder.resolve(host, *addr);
    }
    builder
        .build()
        .map_err(|err| ClientError::Configuration(format!("http client build failed: {err}")))
}

/// Classifies a send failure.
fn describe_send_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    }
}

/// Copies response headers with lower-cased names.
fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, String> {
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| "response size limit exceeds u64".to_string())?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err("response exceeds size limit".to_string());
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::TimedOut {
            format!("response read timed out: {err}")
        } else {
            format!("failed to read response: {err}")
        }
    })?;
    if buf.len() > max_bytes {
        return Err("response exceeds size limit".to_string());
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only URL assertions."
    )]

    use super::ResponseEnvelope;
    use super::UrlScheme;
    use super::build_url;
    use super::is_log_query_path;
    use crate::request::QueryParams;

    #[test]
    fn log_query_paths_are_detected() {
        assert!(is_log_query_path("/logstores/app/logs"));
        assert!(!is_log_query_path("/logstores/app"));
        assert!(!is_log_query_path("/logstores//logs"));
        assert!(!is_log_query_path("/logstores/a/b/logs"));
        assert!(!is_log_query_path("/logs"));
    }

    #[test]
    fn log_query_urls_follow_priority_order() {
        let query: QueryParams = [
            ("powerSql", "false"),
            ("reverse", "true"),
            ("query", "a b"),
            ("to", "2"),
            ("from", "1"),
        ]
        .into_iter()
        .collect();
        let url = build_url(UrlScheme::Https, "p.h", "/logstores/app/logs", &query);
        assert_eq!(
            url,
            "https://p.h/logstores/app/logs?from=1&to=2&query=a+b&reverse=true&powerSql=false"
        );
    }

    #[test]
    fn other_urls_keep_insertion_order() {
        let query: QueryParams = [("type", "log"), ("from", "1"), ("query", "\"x\" | y")]
            .into_iter()
            .collect();
        let url = build_url(UrlScheme::Http, "p.h", "/logstores/app", &query);
        assert_eq!(url, "http://p.h/logstores/app?type=log&from=1&query=%22x%22+%7C+y");
    }

    #[test]
    fn empty_query_has_no_separator() {
        let url = build_url(UrlScheme::Https, "p.h", "/", &QueryParams::new());
        assert_eq!(url, "https://p.h/");
    }

    #[test]
    fn envelope_success_requires_2xx_without_error() {
        let ok = ResponseEnvelope::received(204, "", Default::default());
        assert!(ok.is_success());
        let redirect = ResponseEnvelope::received(302, "", Default::default());
        assert!(!redirect.is_success());
        assert!(!ResponseEnvelope::transport_failure("boom").is_success());
    }
}
