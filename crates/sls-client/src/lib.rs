// crates/sls-client/src/lib.rs
// ============================================================================
// Module: SLS Client
// Description: Signed request client for the SLS log service REST API.
// Purpose: Canonicalize, sign, send, and normalize read-only log operations.
// Dependencies: base64, hmac, md-5, reqwest, serde, sha1, thiserror, time, url
// ============================================================================

//! ## Overview
//! This crate turns typed operation requests into signed HTTP calls and
//! returns a uniform [`NormalizedResult`]. The pipeline for every call is:
//! validation, [`RequestDescriptor`], optional query canonicalization,
//! canonical string, HMAC-SHA1 signature, [`Transport`], normalization.
//!
//! Invariants:
//! - The canonical string is byte-for-byte deterministic for fixed inputs.
//! - Only parameters in [`signing::SIGNABLE_PARAMETERS`] are signed; all are sent.
//! - Remote failures never surface as `Err`; only configuration and
//!   validation problems do, and always before I/O.
//!
//! Security posture: the access key secret is only read by the signer and is
//! redacted from `Debug` output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod endpoint;
pub mod error;
pub mod normalize;
pub mod operations;
pub mod query;
pub mod request;
pub mod signer;
pub mod signing;
pub mod transport;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use endpoint::Credentials;
pub use endpoint::EndpointTarget;
pub use error::ClientError;
pub use normalize::EchoedResult;
pub use normalize::NormalizedResult;
pub use normalize::ResponseShape;
pub use normalize::normalize;
pub use operations::ContextLogQuery;
pub use operations::CursorPosition;
pub use operations::HistogramQuery;
pub use operations::LogQuery;
pub use operations::LogStoreClient;
pub use operations::MachineGroupListing;
pub use operations::Paging;
pub use operations::ProjectListing;
pub use operations::RawLogRequest;
pub use operations::SqlQuery;
pub use query::canonicalize_query;
pub use query::prepare_log_query;
pub use request::HttpMethod;
pub use request::QueryParams;
pub use request::RequestDescriptor;
pub use signer::RequestSigner;
pub use signing::SignableRequest;
pub use signing::build_signable_request;
pub use transport::HttpTransport;
pub use transport::OutboundRequest;
pub use transport::ResponseEnvelope;
pub use transport::Transport;
pub use transport::TransportConfig;
pub use transport::UrlScheme;
pub use validation::ClientLimits;
