// crates/sls-client/src/signer.rs
// ============================================================================
// Module: Request Signer
// Description: HMAC-SHA1 signature over the canonical string.
// Purpose: Produce the `Authorization` header and fail fast on bad keys.
// Dependencies: base64, hmac, sha1
// ============================================================================

//! ## Overview
//! The signer owns the access key pair. A signer cannot be built from an
//! empty key id or secret, so a request is never sent with an empty
//! signature. Signatures are computed per request and never cached.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::Hmac;
use hmac::Mac;
use sha1::Sha1;

use crate::endpoint::Credentials;
use crate::error::ClientError;
use crate::signing::SignableRequest;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HMAC-SHA1 keyed hash.
type HmacSha1 = Hmac<Sha1>;

/// Authorization scheme label.
pub const AUTHORIZATION_SCHEME: &str = "LOG";

/// Signs canonical strings with a shared secret.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    /// Validated credentials.
    credentials: Credentials,
}

impl RequestSigner {
    /// Builds a signer from credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the key id or secret is empty.
    pub fn new(credentials: Credentials) -> Result<Self, ClientError> {
        if credentials.access_key_id().trim().is_empty() {
            return Err(ClientError::Configuration("access key id must be non-empty".to_string()));
        }
        if credentials.access_key_secret().is_empty() {
            return Err(ClientError::Configuration(
                "access key secret must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            credentials,
        })
    }

    /// Returns the access key identifier.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        self.credentials.access_key_id()
    }

    /// Computes the Base64 HMAC-SHA1 signature of a canonical string.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the MAC rejects the key.
    pub fn sign(&self, canonical_string: &str) -> Result<String, ClientError> {
        let mut mac = HmacSha1::new_from_slice(self.credentials.access_key_secret().as_bytes())
            .map_err(|err| ClientError::Configuration(format!("signing key rejected: {err}")))?;
        mac.update(canonical_string.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Formats the `Authorization` header value for a signature.
    #[must_use]
    pub fn authorization(&self, signature: &str) -> String {
        format!("{AUTHORIZATION_SCHEME} {}:{signature}", self.access_key_id())
    }

    /// Signs a request and returns its full header set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when signing fails.
    pub fn signed_headers(
        &self,
        request: SignableRequest,
    ) -> Result<Vec<(String, String)>, ClientError> {
        let signature = self.sign(request.canonical_string())?;
        let mut headers = request.into_headers();
        headers.push(("Authorization".to_string(), self.authorization(&signature)));
        Ok(headers)
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
        reason = "Test-only signer assertions."
    )]

    use super::RequestSigner;
    use crate::endpoint::Credentials;
    use crate::error::ClientError;

    #[test]
    fn empty_secret_fails_fast() {
        let result = RequestSigner::new(Credentials::new("id", ""));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn empty_key_id_fails_fast() {
        let result = RequestSigner::new(Credentials::new("  ", "secret"));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn signature_matches_reference_vector() {
        // RFC 2202 test case 2.
        let signer = RequestSigner::new(Credentials::new("id", "Jefe")).unwrap();
        let signature = signer.sign("what do ya want for nothing?").unwrap();
        assert_eq!(signature, "7/zfauXrL6LSdBbV8YTfnCWafHk=");
    }

    #[test]
    fn signature_is_stable() {
        let signer = RequestSigner::new(Credentials::new("id", "secret")).unwrap();
        let first = signer.sign("GET\n\napplication/json\nd\n/").unwrap();
        let second = signer.sign("GET\n\napplication/json\nd\n/").unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn authorization_uses_log_scheme() {
        let signer = RequestSigner::new(Credentials::new("AKID", "secret")).unwrap();
        assert_eq!(signer.authorization("c2ln"), "LOG AKID:c2ln");
    }
}
