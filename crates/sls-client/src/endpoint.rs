// crates/sls-client/src/endpoint.rs
// ============================================================================
// Module: Endpoint Target
// Description: Resolved backend coordinates and access credentials.
// Purpose: Carry the (host, namespace) pair and key material into the client.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`EndpointTarget`] is resolved outside the client from a system alias
//! and handed over as an opaque pair. The client only checks that both halves
//! are non-empty. [`Credentials`] hold the access key pair; the secret never
//! appears in `Debug` output or serialized payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::error::ClientError;

// ============================================================================
// SECTION: Endpoint Target
// ============================================================================

/// Resolved backend endpoint and project namespace.
///
/// # Invariants
/// - `host` and `namespace` are trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointTarget {
    /// Service endpoint host, optionally with a port.
    host: String,
    /// Project namespace prefixed onto the host.
    namespace: String,
}

impl EndpointTarget {
    /// Builds an endpoint target from its two halves.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when either half is empty.
    pub fn new(host: impl AsRef<str>, namespace: impl AsRef<str>) -> Result<Self, ClientError> {
        let host = host.as_ref().trim();
        let namespace = namespace.as_ref().trim();
        if host.is_empty() {
            return Err(ClientError::Configuration("endpoint host must be non-empty".to_string()));
        }
        if namespace.is_empty() {
            return Err(ClientError::Configuration(
                "endpoint namespace must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            host: host.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Returns the endpoint host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the project namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the `{namespace}.{host}` authority used for the URL and `Host`.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}.{}", self.namespace, self.host)
    }
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Access key pair used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Public access key identifier.
    access_key_id: String,
    /// Shared signing secret.
    access_key_secret: String,
}

impl Credentials {
    /// Creates a credential pair. Emptiness is checked by the signer.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Returns the access key identifier.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Returns the signing secret.
    pub(crate) fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
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
        reason = "Test-only endpoint assertions."
    )]

    use super::Credentials;
    use super::EndpointTarget;
    use crate::error::ClientError;

    #[test]
    fn endpoint_trims_and_builds_authority() {
        let target = EndpointTarget::new("  log.example.com ", " proj1").unwrap();
        assert_eq!(target.host(), "log.example.com");
        assert_eq!(target.namespace(), "proj1");
        assert_eq!(target.authority(), "proj1.log.example.com");
    }

    #[test]
    fn endpoint_rejects_blank_halves() {
        assert!(matches!(EndpointTarget::new(" ", "proj"), Err(ClientError::Configuration(_))));
        assert!(matches!(
            EndpointTarget::new("log.example.com", ""),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let credentials = Credentials::new("id-1", "super-secret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("id-1"));
        assert!(!rendered.contains("super-secret"));
    }
}
