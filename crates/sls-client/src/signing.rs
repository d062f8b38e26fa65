// crates/sls-client/src/signing.rs
// ============================================================================
// Module: Canonical Request Builder
// Description: Canonical string and header assembly for request signing.
// Purpose: Produce the exact byte sequence the vendor signature covers.
// Dependencies: md-5, time
// ============================================================================

//! ## Overview
//! The builder turns a [`RequestDescriptor`], a wall-clock instant, and an
//! [`EndpointTarget`] into a [`SignableRequest`]. The canonical string is
//!
//! ```text
//! METHOD \n Content-MD5 \n Content-Type \n Date \n CanonicalizedHeaders CanonicalizedResource
//! ```
//!
//! Only parameters in [`SIGNABLE_PARAMETERS`] participate in the resource
//! part; everything else is still transmitted. The builder is pure: it
//! performs no I/O and never mutates the descriptor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use md5::Digest;
use md5::Md5;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::endpoint::EndpointTarget;
use crate::error::ClientError;
use crate::request::QueryParams;
use crate::request::RequestDescriptor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API version advertised on every request.
pub const API_VERSION: &str = "0.6.0";
/// Signature method advertised on every request.
pub const SIGNATURE_METHOD: &str = "hmac-sha1";
/// Header name prefixes that participate in the signature.
pub const SIGNED_HEADER_PREFIXES: [&str; 2] = ["x-log-", "x-acs-"];
/// RFC 1123 date layout used by the `Date` header.
const HTTP_DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Query parameter names that participate in the signature.
///
/// Sorted by byte order so lookups can binary search.
pub const SIGNABLE_PARAMETERS: &[&str] = &[
    "acl",
    "back_lines",
    "buildsearch",
    "compose",
    "composecheck",
    "configName",
    "count",
    "cursor",
    "cw",
    "delete",
    "distinct",
    "end",
    "filter",
    "forward_lines",
    "from",
    "group",
    "groupchecking",
    "histogram",
    "indexcfg",
    "key",
    "line",
    "logging",
    "logstore",
    "logstoreName",
    "notimeout",
    "offset",
    "order",
    "pack_id",
    "pack_meta",
    "powerSql",
    "progress",
    "project",
    "projectName",
    "query",
    "rebuild",
    "request",
    "reverse",
    "rewrite",
    "saveas",
    "shard",
    "shardId",
    "size",
    "sort",
    "source",
    "start",
    "status",
    "tags",
    "time",
    "to",
    "token",
    "topic",
    "type",
    "wd",
    "where",
    "x-log-compresstype",
    "x-log-deleteobject",
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Canonical string plus the headers that must accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableRequest {
    /// Exact string fed to the signer.
    canonical_string: String,
    /// Headers to send, in emission order, excluding `Authorization`.
    headers: Vec<(String, String)>,
}

impl SignableRequest {
    /// Returns the canonical string.
    #[must_use]
    pub fn canonical_string(&self) -> &str {
        &self.canonical_string
    }

    /// Returns the headers to send.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Consumes the request and returns its headers.
    #[must_use]
    pub fn into_headers(self) -> Vec<(String, String)> {
        self.headers
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the canonical string and header set for a request.
///
/// # Errors
///
/// Returns [`ClientError::Configuration`] when `now` cannot be rendered as
/// an HTTP date.
pub fn build_signable_request(
    descriptor: &RequestDescriptor,
    now: OffsetDateTime,
    target: &EndpointTarget,
) -> Result<SignableRequest, ClientError> {
    let body = descriptor.body().filter(|bytes| !bytes.is_empty());
    let content_md5 = body.map(content_md5);
    let date = format_http_date(now)?;

    let mut vendor_headers = vec![
        ("x-log-apiversion".to_string(), API_VERSION.to_string()),
        ("x-log-signaturemethod".to_string(), SIGNATURE_METHOD.to_string()),
    ];
    if let Some(bytes) = body {
        vendor_headers.push(("x-log-bodyrawsize".to_string(), bytes.len().to_string()));
    }

    let canonical_string = format!(
        "{method}\n{md5}\n{content_type}\n{date}\n{headers}{resource}",
        method = descriptor.method().as_str(),
        md5 = content_md5.as_deref().unwrap_or_default(),
        content_type = descriptor.content_type(),
        headers = canonicalized_headers(&vendor_headers),
        resource = canonicalized_resource(descriptor.resource_path(), descriptor.query()),
    );

    let mut headers = Vec::with_capacity(vendor_headers.len() + 4);
    headers.push(("Date".to_string(), date));
    headers.push(("Host".to_string(), target.authority()));
    headers.extend(vendor_headers);
    headers.push(("Content-Type".to_string(), descriptor.content_type().to_string()));
    if let Some(md5) = content_md5 {
        headers.push(("Content-MD5".to_string(), md5));
    }

    Ok(SignableRequest {
        canonical_string,
        headers,
    })
}

/// Returns true when a query parameter participates in the signature.
#[must_use]
pub fn is_signable(name: &str) -> bool {
    SIGNABLE_PARAMETERS.binary_search(&name).is_ok()
}

/// Computes the uppercase hex MD5 digest of a body.
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    hex_upper(&Md5::digest(body))
}

/// Formats an instant as an RFC 1123 GMT date.
///
/// # Errors
///
/// Returns [`ClientError::Configuration`] when the year does not fit the
/// four-digit layout.
pub fn format_http_date(at: OffsetDateTime) -> Result<String, ClientError> {
    at.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE_FORMAT)
        .map_err(|err| ClientError::Configuration(format!("http date: {err}")))
}

/// Renders vendor headers as sorted `name:value\n` lines.
#[must_use]
pub fn canonicalized_headers(headers: &[(String, String)]) -> String {
    let mut selected: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .filter(|(name, _)| SIGNED_HEADER_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
        .collect();
    selected.sort();
    let mut out = String::new();
    for (name, value) in selected {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Renders the resource path plus sorted raw `key=value` signable pairs.
#[must_use]
pub fn canonicalized_resource(resource_path: &str, query: &QueryParams) -> String {
    let mut pairs: Vec<String> = query
        .iter()
        .filter(|(key, _)| is_signable(key))
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if pairs.is_empty() {
        return resource_path.to_string();
    }
    pairs.sort();
    format!("{resource_path}?{}", pairs.join("&"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes bytes as an uppercase hex string.
fn hex_upper(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
