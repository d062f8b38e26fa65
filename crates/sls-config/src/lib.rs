// crates/sls-config/src/lib.rs
// ============================================================================
// Module: SLS Config Library
// Description: Configuration model, validation, and system alias table.
// Purpose: Single source of truth for sls-mcp.toml semantics.
// Dependencies: sls-client, serde, toml
// ============================================================================

//! ## Overview
//! `sls-config` loads `sls-mcp.toml`, validates it fail-closed, and resolves
//! business system names or aliases to endpoint targets.
//!
//! Security posture: config inputs are untrusted, and the access key secret is
//! redacted from `Debug` output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
