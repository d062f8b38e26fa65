// crates/sls-mcp/src/lib.rs
// ============================================================================
// Module: SLS MCP
// Description: MCP tool server over the signed SLS client.
// Purpose: Expose read-only log operations as JSON-RPC tools.
// Dependencies: sls-client, sls-config, axum, tokio
// ============================================================================

//! ## Overview
//! SLS MCP exposes the [`sls_client::LogStoreClient`] operations as MCP tools.
//! Callers name a system from the configured alias table; the router resolves
//! it to an endpoint and project per call, fills omitted parameters from
//! `[defaults]`, and records each call in the audit sink and history.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod defaults;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::CallOutcome;
pub use audit::FileServiceLogSink;
pub use audit::NoopServiceLogSink;
pub use audit::ServiceLogEvent;
pub use audit::ServiceLogHistory;
pub use audit::ServiceLogPage;
pub use audit::ServiceLogSink;
pub use audit::StderrServiceLogSink;
pub use catalog::ToolDefinition;
pub use catalog::ToolName;
pub use defaults::TimeArg;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolError;
pub use tools::ToolOutput;
pub use tools::ToolRouter;
