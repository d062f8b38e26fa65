// crates/sls-client/src/request.rs
// ============================================================================
// Module: Request Descriptor
// Description: Logical API call before signing and transport.
// Purpose: Hold method, resource path, ordered parameters, and optional body.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`RequestDescriptor`] is the input to the canonical request builder.
//! Query parameters keep their insertion order because some endpoints are
//! sensitive to it on the wire; the signature sorts them independently.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type sent and signed for every request.
pub const CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Types
// ============================================================================

/// HTTP methods used by the log service API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
}

impl HttpMethod {
    /// Returns the method token as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Insertion-ordered query parameters.
///
/// # Invariants
/// - Keys are unique; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Key/value pairs in insertion order.
    entries: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Inserts a parameter only when a value is present.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.as_str())
    }

    /// Iterates parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the number of parameters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no parameters are set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Logical request handed to the canonical request builder.
///
/// # Invariants
/// - `resource_path` always begins with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method.
    method: HttpMethod,
    /// Resource path relative to the endpoint authority.
    resource_path: String,
    /// Ordered query parameters.
    query: QueryParams,
    /// Optional request body.
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Creates a GET descriptor for the given path.
    #[must_use]
    pub fn get(resource_path: &str) -> Self {
        Self {
            method: HttpMethod::Get,
            resource_path: normalize_path(resource_path),
            query: QueryParams::new(),
            body: None,
        }
    }

    /// Creates a POST descriptor carrying a body.
    #[must_use]
    pub fn post(resource_path: &str, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            resource_path: normalize_path(resource_path),
            query: QueryParams::new(),
            body: Some(body),
        }
    }

    /// Replaces the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the normalized resource path.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Returns the query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Returns the body bytes when present.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns the fixed content type.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures a resource path begins with `/`.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{trimmed}") }
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
        reason = "Test-only request assertions."
    )]

    use super::HttpMethod;
    use super::QueryParams;
    use super::RequestDescriptor;

    #[test]
    fn paths_are_rooted() {
        assert_eq!(RequestDescriptor::get("").resource_path(), "/");
        assert_eq!(RequestDescriptor::get("logstores").resource_path(), "/logstores");
        assert_eq!(RequestDescriptor::get("/logstores/app").resource_path(), "/logstores/app");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut params = QueryParams::new();
        params.insert("type", "log");
        params.insert("from", "1");
        params.insert("type", "histogram");
        let collected: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(collected, vec![("type", "histogram"), ("from", "1")]);
    }

    #[test]
    fn insert_opt_skips_missing_values() {
        let mut params = QueryParams::new();
        params.insert_opt("topic", None::<String>);
        params.insert_opt("groupName", Some("web"));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("groupName"), Some("web"));
    }

    #[test]
    fn post_keeps_body() {
        let descriptor = RequestDescriptor::post("/logstores/app/logs", b"{}".to_vec());
        assert_eq!(descriptor.method(), HttpMethod::Post);
        assert_eq!(descriptor.body(), Some(&b"{}"[..]));
        assert_eq!(descriptor.content_type(), "application/json");
    }
}
