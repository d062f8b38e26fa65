// crates/sls-client/src/operations.rs
// ============================================================================
// Module: Operation Facade
// Description: Typed read-only operations over the signed request pipeline.
// Purpose: Validate input, sign, send, and normalize in one call per operation.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`LogStoreClient`] binds one endpoint target to a signer, transport, and
//! clock. Each operation is a fresh round trip:
//! validation, descriptor, signing, transport, normalization.
//!
//! Validation and configuration problems are returned as `Err` before any I/O.
//! Remote problems come back as `Ok` with an error, raw, or data result.
//!
//! Security posture: callers supply untrusted names and query text. Resource
//! names are restricted to single path segments before they reach a URL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::endpoint::Credentials;
use crate::endpoint::EndpointTarget;
use crate::error::ClientError;
use crate::normalize::EchoedResult;
use crate::normalize::NormalizedResult;
use crate::normalize::ResponseShape;
use crate::normalize::normalize;
use crate::query::MATCH_ALL;
use crate::query::prepare_log_query;
use crate::query::prepare_search_query;
use crate::request::QueryParams;
use crate::request::RequestDescriptor;
use crate::signer::RequestSigner;
use crate::signing::build_signable_request;
use crate::transport::OutboundRequest;
use crate::transport::ResponseEnvelope;
use crate::transport::Transport;
use crate::transport::build_url;
use crate::validation::ClientLimits;
use crate::validation::DEFAULT_MAX_LINES;
use crate::validation::require_non_empty;
use crate::validation::require_resource_name;
use crate::validation::validate_context_lines;
use crate::validation::validate_line;
use crate::validation::validate_page_size;
use crate::validation::validate_query_length;
use crate::validation::validate_time_range;
use crate::validation::validate_timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Raw-log window used when the body omits `from`.
pub const DEFAULT_RAW_LOGS_WINDOW_SECS: i64 = 86_400;
/// Progress label reported for coerced log pages.
pub const PROGRESS_COMPLETE: &str = "Complete";
/// Response header carrying the returned log count.
const COUNT_HEADER: &str = "x-log-count";
/// Response header carrying the query progress.
const PROGRESS_HEADER: &str = "x-log-progress";
/// Diagnosis message for a reachable endpoint.
const DIAGNOSIS_OK: &str = "SLS connection is healthy";
/// Diagnosis message for an unreachable endpoint.
const DIAGNOSIS_FAILED: &str = "SLS connection failed; check configuration and network";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Log search over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    /// Logstore name.
    pub logstore: String,
    /// Range start, unix seconds.
    pub from: i64,
    /// Range end, unix seconds.
    pub to: i64,
    /// Raw search expression.
    pub query: String,
    /// Page size.
    pub line: u32,
    /// Page offset.
    pub offset: u64,
    /// Newest-first ordering.
    pub reverse: bool,
    /// Enables the dedicated SQL engine.
    pub power_sql: Option<bool>,
    /// Log topic filter.
    pub topic: Option<String>,
}

impl LogQuery {
    /// Builds a first-page query with default paging.
    #[must_use]
    pub fn new(logstore: impl Into<String>, from: i64, to: i64, query: impl Into<String>) -> Self {
        Self {
            logstore: logstore.into(),
            from,
            to,
            query: query.into(),
            line: DEFAULT_MAX_LINES,
            offset: 0,
            reverse: false,
            power_sql: None,
            topic: None,
        }
    }
}

/// Context lookup around one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLogQuery {
    /// Logstore name.
    pub logstore: String,
    /// Pack identifier of the anchor entry.
    pub pack_id: String,
    /// Pack metadata of the anchor entry.
    pub pack_meta: String,
    /// Entries before the anchor.
    pub back_lines: u32,
    /// Entries after the anchor.
    pub forward_lines: u32,
}

/// Histogram lookup over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramQuery {
    /// Logstore name.
    pub logstore: String,
    /// Range start, unix seconds.
    pub from: i64,
    /// Range end, unix seconds.
    pub to: i64,
    /// Log topic filter.
    pub topic: Option<String>,
    /// Raw search expression.
    pub query: Option<String>,
}

/// Project listing filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectListing {
    /// Project name filter.
    pub project_name: Option<String>,
    /// Page offset.
    pub offset: u64,
    /// Page size.
    pub size: u32,
    /// Resource group filter.
    pub resource_group_id: Option<String>,
}

/// Project-level SQL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlQuery {
    /// SQL text, sent verbatim.
    pub query: String,
    /// Enables the dedicated SQL engine.
    pub power_sql: bool,
}

/// Shard cursor anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPosition {
    /// Oldest retained entry.
    Begin,
    /// Newest entry.
    End,
    /// First entry at or after a unix timestamp.
    At(i64),
}

impl CursorPosition {
    /// Renders the `from` parameter value.
    #[must_use]
    pub fn as_param(self) -> String {
        match self {
            Self::Begin => "begin".to_string(),
            Self::End => "end".to_string(),
            Self::At(seconds) => seconds.to_string(),
        }
    }
}

/// Raw log pull through the POST endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRequest {
    /// Logstore name.
    pub logstore: String,
    /// Range start, defaults to one day before `to`.
    pub from: Option<i64>,
    /// Range end, defaults to now.
    pub to: Option<i64>,
    /// Search expression, defaults to `*`.
    pub query: Option<String>,
    /// Page size.
    pub line: Option<u32>,
    /// Page offset.
    pub offset: Option<u64>,
    /// Newest-first ordering.
    pub reverse: Option<bool>,
    /// Enables the dedicated SQL engine.
    pub power_sql: Option<bool>,
}

/// Offset and size for listing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// Page offset.
    pub offset: u64,
    /// Page size.
    pub size: u32,
}

impl Paging {
    /// Builds a page window.
    #[must_use]
    pub const fn new(offset: u64, size: u32) -> Self {
        Self {
            offset,
            size,
        }
    }
}

/// Machine group listing filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineGroupListing {
    /// Page window.
    pub paging: Paging,
    /// Group name filter.
    pub group_name: Option<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Signed request client bound to one project endpoint.
pub struct LogStoreClient {
    /// Endpoint host and project.
    target: EndpointTarget,
    /// Request signer.
    signer: RequestSigner,
    /// Network seam.
    transport: Arc<dyn Transport>,
    /// Time source for request dates and validation windows.
    clock: Arc<dyn Clock>,
    /// Input bounds.
    limits: ClientLimits,
}

impl fmt::Debug for LogStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStoreClient")
            .field("target", &self.target)
            .field("signer", &self.signer)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl LogStoreClient {
    /// Builds a client using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when credentials are unusable.
    pub fn new(
        target: EndpointTarget,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        limits: ClientLimits,
    ) -> Result<Self, ClientError> {
        let signer = RequestSigner::new(credentials)?;
        Ok(Self {
            target,
            signer,
            transport,
            clock: Arc::new(SystemClock),
            limits,
        })
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the endpoint target.
    #[must_use]
    pub const fn target(&self) -> &EndpointTarget {
        &self.target
    }

    /// Returns the input bounds.
    #[must_use]
    pub const fn limits(&self) -> &ClientLimits {
        &self.limits
    }

    /// Signs a descriptor and assembles the wire request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when signing fails.
    pub fn prepare(&self, descriptor: &RequestDescriptor) -> Result<OutboundRequest, ClientError> {
        let signable = build_signable_request(descriptor, self.clock.now(), &self.target)?;
        let headers = self.signer.signed_headers(signable)?;
        let url = build_url(
            self.transport.scheme(),
            &self.target.authority(),
            descriptor.resource_path(),
            descriptor.query(),
        );
        Ok(OutboundRequest {
            method: descriptor.method(),
            url,
            headers,
            body: descriptor.body().map(<[u8]>::to_vec),
        })
    }

    /// Sends a descriptor and normalizes the response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when signing fails.
    pub fn execute(
        &self,
        descriptor: &RequestDescriptor,
        shape: ResponseShape,
    ) -> Result<NormalizedResult, ClientError> {
        let envelope = self.dispatch(descriptor)?;
        Ok(normalize(&envelope, shape))
    }

    /// Sends a descriptor and returns the raw envelope.
    fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<ResponseEnvelope, ClientError> {
        let request = self.prepare(descriptor)?;
        Ok(self.transport.send(&request))
    }

    // ------------------------------------------------------------------------
    // Logstores and logs
    // ------------------------------------------------------------------------

    /// Lists logstores in the project.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when signing fails.
    pub fn list_logstores(&self) -> Result<NormalizedResult, ClientError> {
        self.execute(&RequestDescriptor::get("/logstores"), ResponseShape::Object)
    }

    /// Searches logs and coerces the response into a log page.
    ///
    /// The result always carries `count`, `logs`, and `progress` unless the
    /// call failed or the body was not JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_logs(&self, query: &LogQuery) -> Result<NormalizedResult, ClientError> {
        let descriptor = self.log_query_descriptor(query, false)?;
        let envelope = self.dispatch(&descriptor)?;
        let result = normalize(&envelope, ResponseShape::Passthrough);
        Ok(coerce_log_page(&envelope, result))
    }

    /// Searches logs with topic and SQL engine options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn query_logstore_logs(&self, query: &LogQuery) -> Result<NormalizedResult, ClientError> {
        let descriptor = self.log_query_descriptor(query, true)?;
        self.execute(&descriptor, ResponseShape::Passthrough)
    }

    /// Fetches entries around a pack anchor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_context_logs(&self, query: &ContextLogQuery) -> Result<EchoedResult, ClientError> {
        let logstore = require_resource_name("logstore", &query.logstore)?;
        let pack_id = require_non_empty("pack_id", &query.pack_id)?;
        let pack_meta = require_non_empty("pack_meta", &query.pack_meta)?;
        validate_context_lines("back_lines", query.back_lines, &self.limits)?;
        validate_context_lines("forward_lines", query.forward_lines, &self.limits)?;

        let mut params = QueryParams::new();
        params.insert("type", "context_log");
        params.insert("pack_id", pack_id);
        params.insert("pack_meta", pack_meta);
        params.insert("back_lines", query.back_lines.to_string());
        params.insert("forward_lines", query.forward_lines.to_string());
        let descriptor = RequestDescriptor::get(&logstore_path(logstore)).with_query(params);
        let result = self.execute(&descriptor, ResponseShape::Object)?;

        let mut echo = Map::new();
        echo.insert("pack_id".to_string(), Value::String(pack_id.to_string()));
        echo.insert("pack_meta".to_string(), Value::String(pack_meta.to_string()));
        Ok(EchoedResult::new(result, echo))
    }

    /// Fetches the index configuration of a logstore.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad logstore name.
    pub fn get_index(&self, logstore: &str) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        let path = format!("{}/index", logstore_path(logstore));
        self.execute(&RequestDescriptor::get(&path), ResponseShape::Object)
    }

    /// Fetches log-count histograms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_histograms(&self, query: &HistogramQuery) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", &query.logstore)?;
        validate_time_range(query.from, query.to, self.clock.now_unix(), &self.limits)?;
        let raw_query = query.query.as_deref().unwrap_or_default();
        validate_query_length(raw_query, &self.limits)?;

        let mut params = QueryParams::new();
        params.insert("type", "histogram");
        params.insert("from", query.from.to_string());
        params.insert("to", query.to.to_string());
        params.insert_opt("topic", query.topic.as_deref());
        params.insert("query", prepare_search_query(raw_query));
        let descriptor = RequestDescriptor::get(&logstore_path(logstore)).with_query(params);
        self.execute(&descriptor, ResponseShape::Passthrough)
    }

    /// Fetches logstore settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad logstore name.
    pub fn get_logstore(&self, logstore: &str) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        self.execute(&RequestDescriptor::get(&logstore_path(logstore)), ResponseShape::Object)
    }

    /// Lists the shards of a logstore.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad logstore name.
    pub fn list_shards(&self, logstore: &str) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        let path = format!("{}/shards", logstore_path(logstore));
        self.execute(&RequestDescriptor::get(&path), ResponseShape::List)
    }

    /// Resolves a shard cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_cursor(
        &self,
        logstore: &str,
        shard_id: u32,
        position: CursorPosition,
    ) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        if let CursorPosition::At(seconds) = position {
            validate_timestamp("from", seconds, self.clock.now_unix(), &self.limits)?;
        }
        let mut params = QueryParams::new();
        params.insert("type", "cursor");
        params.insert("from", position.as_param());
        let descriptor =
            RequestDescriptor::get(&shard_path(logstore, shard_id)).with_query(params);
        self.execute(&descriptor, ResponseShape::Object)
    }

    /// Resolves the server time of a shard cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_cursor_time(
        &self,
        logstore: &str,
        shard_id: u32,
        cursor: &str,
    ) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        let cursor = require_non_empty("cursor", cursor)?;
        let mut params = QueryParams::new();
        params.insert("type", "cursor_time");
        params.insert("cursor", cursor);
        let descriptor =
            RequestDescriptor::get(&shard_path(logstore, shard_id)).with_query(params);
        self.execute(&descriptor, ResponseShape::Object)
    }

    /// Pulls raw logs through the POST endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn get_raw_logs(&self, request: &RawLogRequest) -> Result<EchoedResult, ClientError> {
        let logstore = require_resource_name("logstore", &request.logstore)?;
        let now = self.clock.now_unix();
        let to = request.to.unwrap_or(now);
        let from =
            request.from.unwrap_or_else(|| to.saturating_sub(DEFAULT_RAW_LOGS_WINDOW_SECS));
        validate_time_range(from, to, now, &self.limits)?;
        if let Some(line) = request.line {
            validate_line(line, &self.limits)?;
        }
        let query = match request.query.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => MATCH_ALL,
        };
        validate_query_length(query, &self.limits)?;

        let mut params = QueryParams::new();
        params.insert("from", from.to_string());
        params.insert("to", to.to_string());
        params.insert_opt("line", request.line.as_ref().map(ToString::to_string));
        params.insert_opt("offset", request.offset.as_ref().map(ToString::to_string));
        params.insert_opt("reverse", request.reverse.as_ref().map(ToString::to_string));
        params.insert_opt("powerSql", request.power_sql.as_ref().map(ToString::to_string));
        let body = serde_json::to_vec(&json!({ "query": query }))
            .map_err(|err| ClientError::Validation(format!("raw log body: {err}")))?;
        let path = format!("{}/logs", logstore_path(logstore));
        let descriptor = RequestDescriptor::post(&path, body).with_query(params);
        let result = self.execute(&descriptor, ResponseShape::Passthrough)?;

        let mut echo = Map::new();
        echo.insert("logstore".to_string(), Value::String(logstore.to_string()));
        Ok(EchoedResult::new(result, echo))
    }

    /// Fetches the metering mode of a logstore.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad logstore name.
    pub fn get_logstore_metering_mode(
        &self,
        logstore: &str,
    ) -> Result<NormalizedResult, ClientError> {
        let logstore = require_resource_name("logstore", logstore)?;
        let path = format!("{}/meteringmode", logstore_path(logstore));
        self.execute(&RequestDescriptor::get(&path), ResponseShape::Object)
    }

    // ------------------------------------------------------------------------
    // Project
    // ------------------------------------------------------------------------

    /// Fetches project details.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when signing fails.
    pub fn get_project(&self) -> Result<NormalizedResult, ClientError> {
        self.execute(&RequestDescriptor::get("/"), ResponseShape::Object)
    }

    /// Lists projects visible to the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad page size.
    pub fn list_projects(&self, listing: &ProjectListing) -> Result<NormalizedResult, ClientError> {
        validate_page_size(listing.size, &self.limits)?;
        let mut params = QueryParams::new();
        params.insert_opt("projectName", non_blank(listing.project_name.as_deref()));
        params.insert("offset", listing.offset.to_string());
        params.insert("size", listing.size.to_string());
        params.insert_opt("resourceGroupId", non_blank(listing.resource_group_id.as_deref()));
        let descriptor = RequestDescriptor::get("/").with_query(params);
        self.execute(&descriptor, ResponseShape::Object)
    }

    /// Runs a project-level SQL query.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a blank or oversized query.
    pub fn query_logs_by_sql(&self, query: &SqlQuery) -> Result<NormalizedResult, ClientError> {
        let sql = require_non_empty("query", &query.query)?;
        validate_query_length(sql, &self.limits)?;
        let mut params = QueryParams::new();
        params.insert("query", sql);
        params.insert("powerSql", query.power_sql.to_string());
        let descriptor = RequestDescriptor::get("/logs").with_query(params);
        self.execute(&descriptor, ResponseShape::Passthrough)
    }

    /// Fetches the project service-log settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when signing fails.
    pub fn get_logging(&self) -> Result<NormalizedResult, ClientError> {
        self.execute(&RequestDescriptor::get("/logging"), ResponseShape::Object)
    }

    // ------------------------------------------------------------------------
    // Machine groups and configs
    // ------------------------------------------------------------------------

    /// Lists machine groups.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad page size.
    pub fn list_machine_groups(
        &self,
        listing: &MachineGroupListing,
    ) -> Result<NormalizedResult, ClientError> {
        let mut params = self.paging_params(listing.paging)?;
        params.insert_opt("groupName", non_blank(listing.group_name.as_deref()));
        let descriptor = RequestDescriptor::get("/machinegroups").with_query(params);
        self.execute(&descriptor, ResponseShape::Object)
    }

    /// Lists machines in a group.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for bad input.
    pub fn list_machines(
        &self,
        machine_group: &str,
        paging: Paging,
    ) -> Result<NormalizedResult, ClientError> {
        let group = require_resource_name("machine_group", machine_group)?;
        let params = self.paging_params(paging)?;
        let path = format!("/machinegroups/{group}/machines");
        self.execute(&RequestDescriptor::get(&path).with_query(params), ResponseShape::Object)
    }

    /// Fetches a machine group.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad group name.
    pub fn get_machine_group(&self, machine_group: &str) -> Result<NormalizedResult, ClientError> {
        let group = require_resource_name("machine_group", machine_group)?;
        let path = format!("/machinegroups/{group}");
        self.execute(&RequestDescriptor::get(&path), ResponseShape::Object)
    }

    /// Lists configs applied to a machine group.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad group name.
    pub fn get_applied_configs(
        &self,
        machine_group: &str,
    ) -> Result<NormalizedResult, ClientError> {
        let group = require_resource_name("machine_group", machine_group)?;
        let path = format!("/machinegroups/{group}/configs");
        self.execute(&RequestDescriptor::get(&path), ResponseShape::Object)
    }

    /// Lists machine groups a config is applied to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad config name.
    pub fn get_applied_machine_groups(
        &self,
        config_name: &str,
    ) -> Result<NormalizedResult, ClientError> {
        let config = require_resource_name("config_name", config_name)?;
        let path = format!("/configs/{config}/machinegroups");
        self.execute(&RequestDescriptor::get(&path), ResponseShape::Object)
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Probes the endpoint and reports whether it is usable.
    ///
    /// Probes the logstore index when a logstore is given, otherwise the
    /// project. A successful probe is followed by a logstore listing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a bad logstore name.
    pub fn diagnose_connection(
        &self,
        logstore: Option<&str>,
    ) -> Result<NormalizedResult, ClientError> {
        let (probe_key, probe) = match logstore {
            Some(name) => ("logstoreTestResult", self.get_index(name)?),
            None => ("projectTestResult", self.get_project()?),
        };
        let mut connection_valid = !probe.is_error();
        let mut report = Map::new();
        report.insert(probe_key.to_string(), probe.into_value());

        if connection_valid {
            let listing = self.list_logstores()?;
            if listing.is_error() {
                connection_valid = false;
            } else {
                let logstores = match listing.into_value() {
                    Value::Object(mut map) => map.remove("logstores"),
                    _ => None,
                };
                let count = logstores.as_ref().and_then(Value::as_array).map_or(0, Vec::len);
                if let Some(logstores) = logstores {
                    report.insert("logstores".to_string(), logstores);
                }
                report.insert("logstoreCount".to_string(), Value::from(count));
            }
        }

        report.insert("connectionValid".to_string(), Value::Bool(connection_valid));
        let message = if connection_valid { DIAGNOSIS_OK } else { DIAGNOSIS_FAILED };
        report.insert("message".to_string(), Value::String(message.to_string()));
        Ok(NormalizedResult::Object(report))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Validates a log search and builds its descriptor.
    fn log_query_descriptor(
        &self,
        query: &LogQuery,
        extended: bool,
    ) -> Result<RequestDescriptor, ClientError> {
        let logstore = require_resource_name("logstore", &query.logstore)?;
        validate_time_range(query.from, query.to, self.clock.now_unix(), &self.limits)?;
        validate_line(query.line, &self.limits)?;
        validate_query_length(&query.query, &self.limits)?;

        let mut params = QueryParams::new();
        params.insert("type", "log");
        params.insert("from", query.from.to_string());
        params.insert("to", query.to.to_string());
        params.insert("query", prepare_log_query(&query.query));
        params.insert("line", query.line.to_string());
        params.insert("offset", query.offset.to_string());
        params.insert("reverse", query.reverse.to_string());
        if extended {
            params.insert_opt("powerSql", query.power_sql.as_ref().map(ToString::to_string));
            params.insert_opt("topic", non_blank(query.topic.as_deref()));
        }
        Ok(RequestDescriptor::get(&logstore_path(logstore)).with_query(params))
    }

    /// Validates paging and renders `offset` and `size`.
    fn paging_params(&self, paging: Paging) -> Result<QueryParams, ClientError> {
        validate_page_size(paging.size, &self.limits)?;
        let mut params = QueryParams::new();
        params.insert("offset", paging.offset.to_string());
        params.insert("size", paging.size.to_string());
        Ok(params)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path of a logstore resource.
fn logstore_path(logstore: &str) -> String {
    format!("/logstores/{logstore}")
}

/// Path of a shard resource.
fn shard_path(logstore: &str, shard_id: u32) -> String {
    format!("/logstores/{logstore}/shards/{shard_id}")
}

/// Drops blank optional filters.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Coerces a log search response into `{count, logs, progress}`.
fn coerce_log_page(envelope: &ResponseEnvelope, result: NormalizedResult) -> NormalizedResult {
    match result {
        NormalizedResult::Data(Value::Array(logs)) => log_page(envelope, logs),
        NormalizedResult::Data(Value::Object(map)) if map.contains_key("logs") => {
            NormalizedResult::Object(map)
        }
        NormalizedResult::Data(Value::Object(_) | Value::Null) => log_page(envelope, Vec::new()),
        NormalizedResult::Data(_) => NormalizedResult::Raw(envelope.body.clone()),
        other => other,
    }
}

/// Builds a log page using response headers when present.
fn log_page(envelope: &ResponseEnvelope, logs: Vec<Value>) -> NormalizedResult {
    let count = if logs.is_empty() {
        0
    } else {
        envelope
            .header(COUNT_HEADER)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(logs.len())
    };
    let progress = envelope.header(PROGRESS_HEADER).unwrap_or(PROGRESS_COMPLETE);
    let mut map = Map::new();
    map.insert("count".to_string(), Value::from(count));
    map.insert("logs".to_string(), Value::Array(logs));
    map.insert("progress".to_string(), Value::String(progress.to_string()));
    NormalizedResult::Object(map)
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
        reason = "Test-only facade assertions."
    )]

    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use serde_json::json;

    use super::ContextLogQuery;
    use super::CursorPosition;
    use super::LogQuery;
    use super::LogStoreClient;
    use super::MachineGroupListing;
    use super::Paging;
    use super::RawLogRequest;
    use crate::clock::FixedClock;
    use crate::endpoint::Credentials;
    use crate::endpoint::EndpointTarget;
    use crate::error::ClientError;
    use crate::normalize::NormalizedResult;
    use crate::request::HttpMethod;
    use crate::transport::OutboundRequest;
    use crate::transport::ResponseEnvelope;
    use crate::transport::Transport;
    use crate::validation::ClientLimits;

    const NOW: i64 = 1_700_003_600;

    /// Transport that records requests and replays scripted responses.
    struct ScriptedTransport {
        responses: Mutex<Vec<ResponseEnvelope>>,
        sent: Mutex<Vec<OutboundRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<ResponseEnvelope>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<OutboundRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &OutboundRequest) -> ResponseEnvelope {
            self.sent.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                ResponseEnvelope::transport_failure("no scripted response")
            } else {
                responses.remove(0)
            }
        }
    }

    fn ok(body: &str) -> ResponseEnvelope {
        ResponseEnvelope::received(200, body, BTreeMap::new())
    }

    fn client(transport: Arc<ScriptedTransport>) -> LogStoreClient {
        let target = EndpointTarget::new("log.example.com", "proj1").unwrap();
        LogStoreClient::new(
            target,
            Credentials::new("AKID", "secret"),
            transport,
            ClientLimits::default(),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock::from_unix(NOW)))
    }

    #[test]
    fn log_search_builds_ordered_signed_request() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"logs":[{"a":"1"}]}"#)]);
        let client = client(Arc::clone(&transport));
        let query = LogQuery::new("app", 1_700_000_000, 1_700_003_600, "ERROR");
        let result = client.get_logs(&query).unwrap();
        assert_eq!(result.into_value(), json!({"logs": [{"a": "1"}]}));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(
            sent[0].url,
            "https://proj1.log.example.com/logstores/app?type=log&from=1700000000&to=1700003600\
             &query=%22ERROR%22+%7C+with_pack_meta&line=100&offset=0&reverse=false"
        );
        let authorization = sent[0].headers.iter().find(|(name, _)| name == "Authorization");
        assert!(authorization.unwrap().1.starts_with("LOG AKID:"));
    }

    #[test]
    fn log_search_coerces_arrays_and_empty_objects() {
        let transport = ScriptedTransport::new(vec![ok(r#"[{"a":"1"},{"a":"2"}]"#), ok("{}")]);
        let client = client(transport);
        let query = LogQuery::new("app", NOW - 60, NOW, "");
        assert_eq!(
            client.get_logs(&query).unwrap().into_value(),
            json!({"count": 2, "logs": [{"a": "1"}, {"a": "2"}], "progress": "Complete"})
        );
        assert_eq!(
            client.get_logs(&query).unwrap().into_value(),
            json!({"count": 0, "logs": [], "progress": "Complete"})
        );
    }

    #[test]
    fn validation_errors_stop_before_io() {
        let transport = ScriptedTransport::new(Vec::new());
        let client = client(Arc::clone(&transport));
        let blank = LogQuery::new(" ", NOW - 60, NOW, "x");
        assert!(matches!(client.get_logs(&blank), Err(ClientError::Validation(_))));
        let inverted = LogQuery::new("app", NOW, NOW - 60, "x");
        assert!(matches!(client.get_logs(&inverted), Err(ClientError::Validation(_))));
        let ancient = LogQuery::new("app", 1_000, 2_000, "x");
        assert!(matches!(client.get_logs(&ancient), Err(ClientError::Validation(_))));
        let long = LogQuery::new("app", NOW - 60, NOW, "a".repeat(4_097));
        assert!(matches!(client.get_logs(&long), Err(ClientError::Validation(_))));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn context_logs_echo_pack_fields() {
        let transport = ScriptedTransport::new(vec![ResponseEnvelope::received(
            500,
            "boom",
            BTreeMap::new(),
        )]);
        let client = client(transport);
        let query = ContextLogQuery {
            logstore: "app".to_string(),
            pack_id: "P1".to_string(),
            pack_meta: "M1".to_string(),
            back_lines: 70,
            forward_lines: 30,
        };
        let result = client.get_context_logs(&query).unwrap();
        assert_eq!(
            result.into_value(),
            json!({"error": "boom", "pack_id": "P1", "pack_meta": "M1"})
        );
    }

    #[test]
    fn raw_logs_post_query_body_and_echo_logstore() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"count":0}"#)]);
        let client = client(Arc::clone(&transport));
        let request = RawLogRequest {
            logstore: "app".to_string(),
            line: Some(10),
            ..RawLogRequest::default()
        };
        let result = client.get_raw_logs(&request).unwrap();
        assert_eq!(result.into_value(), json!({"data": {"count": 0}, "logstore": "app"}));

        let sent = transport.sent();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(
            sent[0].url,
            "https://proj1.log.example.com/logstores/app/logs?from=1699917200&to=1700003600&line=10"
        );
        assert_eq!(sent[0].body.as_deref(), Some(br#"{"query":"*"}"#.as_slice()));
        assert!(sent[0].headers.iter().any(|(name, _)| name == "Content-MD5"));
    }

    #[test]
    fn raw_logs_reject_extreme_end_without_start() {
        let transport = ScriptedTransport::new(Vec::new());
        let client = client(Arc::clone(&transport));
        let request = RawLogRequest {
            logstore: "app".to_string(),
            to: Some(i64::MIN),
            ..RawLogRequest::default()
        };
        assert!(matches!(client.get_raw_logs(&request), Err(ClientError::Validation(_))));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn cursor_positions_render_as_from() {
        let transport = ScriptedTransport::new(vec![ok("{}"), ok("{}")]);
        let client = client(Arc::clone(&transport));
        client.get_cursor("app", 2, CursorPosition::Begin).unwrap();
        client.get_cursor("app", 2, CursorPosition::At(NOW - 10)).unwrap();
        let sent = transport.sent();
        assert!(sent[0].url.ends_with("/logstores/app/shards/2?type=cursor&from=begin"));
        assert!(sent[1].url.ends_with("?type=cursor&from=1700003590"));
    }

    #[test]
    fn listings_validate_page_size_and_names() {
        let transport = ScriptedTransport::new(vec![ok("{}")]);
        let client = client(Arc::clone(&transport));
        let listing = MachineGroupListing {
            paging: Paging::new(0, 0),
            group_name: None,
        };
        assert!(client.list_machine_groups(&listing).is_err());
        assert!(client.get_machine_group("a/b").is_err());
        client.list_machines("web", Paging::new(5, 20)).unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.ends_with("/machinegroups/web/machines?offset=5&size=20"));
    }

    #[test]
    fn diagnosis_reports_healthy_connection() {
        let transport =
            ScriptedTransport::new(vec![ok(r#"{"keys":{}}"#), ok(r#"{"logstores":["a","b"]}"#)]);
        let client = client(transport);
        let report = client.diagnose_connection(Some("app")).unwrap().into_value();
        assert_eq!(report["connectionValid"], json!(true));
        assert_eq!(report["logstoreCount"], json!(2));
        assert_eq!(report["logstores"], json!(["a", "b"]));
        assert_eq!(report["logstoreTestResult"], json!({"keys": {}}));
    }

    #[test]
    fn diagnosis_reports_failed_probe() {
        let transport =
            ScriptedTransport::new(vec![ResponseEnvelope::transport_failure("refused")]);
        let client = client(Arc::clone(&transport));
        let report = client.diagnose_connection(None).unwrap();
        let NormalizedResult::Object(map) = report else {
            panic!("diagnosis must be an object");
        };
        assert_eq!(map["connectionValid"], json!(false));
        assert_eq!(map["projectTestResult"], json!({"error": "refused"}));
        assert!(!map.contains_key("logstoreCount"));
        assert_eq!(transport.sent().len(), 1);
    }
}
