// crates/sls-client/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Error taxonomy for the signed request client.
// Purpose: Separate pre-flight failures from remote-service outcomes.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Only configuration and validation problems surface as [`ClientError`].
//! Both abort before any network I/O. Transport failures, upstream error
//! statuses, and malformed response bodies are folded into
//! [`crate::NormalizedResult`] instead, so callers never handle a fatal error
//! for a remote-service problem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the signed request client before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Missing or unusable credentials, endpoint, or signer setup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Caller input rejected by pre-flight validation.
    #[error("validation error: {0}")]
    Validation(String),
}
