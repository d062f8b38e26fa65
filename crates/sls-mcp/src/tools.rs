// crates/sls-mcp/src/tools.rs
// ============================================================================
// Module: Tool Router
// Description: Routes tool calls to signed SLS operations.
// Purpose: Decode arguments, apply defaults, call the client, and audit calls.
// Dependencies: serde, serde_json, sls-client, sls-config, thiserror
// ============================================================================

//! ## Overview
//! [`ToolRouter`] owns the configuration, one shared transport, the audit
//! sink, and the call history. Each service call resolves its `systemName`
//! fresh, builds a [`LogStoreClient`] for that endpoint, and records one
//! [`ServiceLogEvent`] once a system name was supplied.
//!
//! Security posture: arguments are untrusted. They are decoded into typed
//! requests and validated by the client before any I/O. Credentials are
//! resolved per call and never echoed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use sls_client::ClientError;
use sls_client::Clock;
use sls_client::ContextLogQuery;
use sls_client::CursorPosition;
use sls_client::EchoedResult;
use sls_client::EndpointTarget;
use sls_client::HistogramQuery;
use sls_client::HttpTransport;
use sls_client::LogQuery;
use sls_client::LogStoreClient;
use sls_client::MachineGroupListing;
use sls_client::NormalizedResult;
use sls_client::Paging;
use sls_client::ProjectListing;
use sls_client::RawLogRequest;
use sls_client::SqlQuery;
use sls_client::SystemClock;
use sls_client::Transport;
use sls_config::AuditSinkKind;
use sls_config::SlsConfig;

use crate::audit::FileServiceLogSink;
use crate::audit::NoopServiceLogSink;
use crate::audit::ServiceLogEvent;
use crate::audit::ServiceLogEventParams;
use crate::audit::ServiceLogHistory;
use crate::audit::ServiceLogSink;
use crate::audit::StderrServiceLogSink;
use crate::catalog::ToolDefinition;
use crate::catalog::ToolName;
use crate::catalog::tool_definitions;
use crate::defaults::TimeArg;
use crate::defaults::calendar_offset;
use crate::defaults::parse_time;
use crate::defaults::resolve_raw_window;
use crate::defaults::resolve_window;

// ============================================================================
// SECTION: Requests
// ============================================================================

// `systemName` is read from the raw arguments before decoding, so the typed
// requests below carry only operation fields.

/// Arguments naming a logstore.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogstoreArgs {
    /// Logstore name.
    logstore: String,
}

/// Arguments for log searches.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogSearchArgs {
    /// Logstore name.
    logstore: String,
    /// Range start.
    from: Option<TimeArg>,
    /// Range end.
    to: Option<TimeArg>,
    /// Search expression.
    query: Option<String>,
    /// Page size.
    line: Option<u32>,
    /// Page offset.
    offset: Option<u64>,
    /// Newest-first ordering.
    reverse: Option<bool>,
    /// Dedicated SQL engine flag.
    power_sql: Option<bool>,
    /// Log topic filter.
    topic: Option<String>,
}

/// Arguments for context lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextLogArgs {
    /// Logstore name.
    logstore: String,
    /// Anchor pack id.
    pack_id: String,
    /// Anchor pack meta.
    pack_meta: String,
    /// Entries before the anchor.
    back_lines: Option<u32>,
    /// Entries after the anchor.
    forward_lines: Option<u32>,
}

/// Arguments for histogram lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistogramArgs {
    /// Logstore name.
    logstore: String,
    /// Range start.
    from: Option<TimeArg>,
    /// Range end.
    to: Option<TimeArg>,
    /// Log topic filter.
    topic: Option<String>,
    /// Search expression.
    query: Option<String>,
}

/// Arguments for project listings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectListArgs {
    /// Project name filter.
    project_name: Option<String>,
    /// Page offset.
    offset: Option<u64>,
    /// Page size.
    size: Option<u32>,
    /// Resource group filter.
    resource_group_id: Option<String>,
}

/// Arguments for project SQL queries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlArgs {
    /// SQL text.
    query: String,
    /// Dedicated SQL engine flag.
    power_sql: Option<bool>,
}

/// Arguments for cursor lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorArgs {
    /// Logstore name.
    logstore: String,
    /// Shard id.
    shard_id: u32,
    /// `begin`, `end`, or a time.
    from: TimeArg,
}

/// Arguments for cursor time lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorTimeArgs {
    /// Logstore name.
    logstore: String,
    /// Shard id.
    shard_id: u32,
    /// Shard cursor.
    cursor: String,
}

/// Arguments for raw log pulls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogArgs {
    /// Logstore name.
    logstore: String,
    /// Request body fields.
    #[serde(default)]
    body: RawLogBody,
}

/// Raw log request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogBody {
    /// Range start.
    from: Option<TimeArg>,
    /// Range end.
    to: Option<TimeArg>,
    /// Search expression.
    query: Option<String>,
    /// Page size.
    line: Option<u32>,
    /// Page offset.
    offset: Option<u64>,
    /// Newest-first ordering.
    reverse: Option<bool>,
    /// Dedicated SQL engine flag.
    power_sql: Option<bool>,
}

/// Arguments for paged listings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedArgs {
    /// Page offset.
    offset: Option<u64>,
    /// Page size.
    size: Option<u32>,
    /// Group name filter.
    group_name: Option<String>,
}

/// Arguments naming a machine group.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineGroupArgs {
    /// Machine group name.
    machine_group: String,
    /// Page offset.
    offset: Option<u64>,
    /// Page size.
    size: Option<u32>,
}

/// Arguments naming a logtail config.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigNameArgs {
    /// Config name.
    config_name: String,
}

/// Arguments for connection diagnosis.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnoseArgs {
    /// Optional logstore to probe.
    logstore: Option<String>,
}

/// Arguments for history listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceLogArgs {
    /// One-based page number.
    page: Option<usize>,
    /// Page size.
    size: Option<usize>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Rendered tool result plus whether the service reported a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// JSON payload returned to the caller.
    pub value: Value,
    /// True when the normalized result was the error variant.
    pub is_error: bool,
}

impl ToolOutput {
    /// Wraps a locally produced payload.
    const fn local(value: Value) -> Self {
        Self {
            value,
            is_error: false,
        }
    }
}

impl From<EchoedResult> for ToolOutput {
    fn from(result: EchoedResult) -> Self {
        let is_error = result.is_error();
        Self {
            value: result.into_value(),
            is_error,
        }
    }
}

/// Tool router for SLS operations.
#[derive(Clone)]
pub struct ToolRouter {
    /// Validated configuration.
    config: Arc<SlsConfig>,
    /// Shared outbound transport.
    transport: Arc<dyn Transport>,
    /// Time source for defaults and request dates.
    clock: Arc<dyn Clock>,
    /// Audit event sink.
    sink: Arc<dyn ServiceLogSink>,
    /// Recent call history.
    history: Arc<ServiceLogHistory>,
}

impl ToolRouter {
    /// Builds a router with an explicit transport and sink.
    #[must_use]
    pub fn new(
        config: SlsConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ServiceLogSink>,
    ) -> Self {
        let history = Arc::new(ServiceLogHistory::new(config.audit.history_capacity));
        Self {
            config: Arc::new(config),
            transport,
            clock: Arc::new(SystemClock),
            sink,
            history,
        }
    }

    /// Builds a router with the HTTP transport and the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Config`] when the transport or sink cannot be built.
    pub fn from_config(config: SlsConfig) -> Result<Self, ToolError> {
        let transport = HttpTransport::new(config.transport_config())
            .map_err(|err| ToolError::Config(err.to_string()))?;
        let sink = build_sink(&config)?;
        Ok(Self::new(config, Arc::new(transport), sink))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the router configuration.
    #[must_use]
    pub fn config(&self) -> &SlsConfig {
        &self.config
    }

    /// Returns the call history.
    #[must_use]
    pub fn history(&self) -> &ServiceLogHistory {
        &self.history
    }

    /// Lists the tools available to callers.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handles a tool call by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when routing, decoding, or validation fails.
    /// Remote failures are returned as `Ok` with an `error` field.
    pub fn handle_tool_call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.invoke(name, arguments).map(|output| output.value)
    }

    /// Handles a tool call and reports whether the service failed.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when routing, decoding, or validation fails.
    pub fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        let arguments = if arguments.is_null() { Value::Object(Map::new()) } else { arguments };
        match tool {
            ToolName::ListServiceLogs => {
                let args: ServiceLogArgs = decode(arguments)?;
                let page = self
                    .history
                    .page(args.page.unwrap_or(1), args.size.unwrap_or_default());
                serde_json::to_value(page)
                    .map(ToolOutput::local)
                    .map_err(|_| ToolError::Serialization)
            }
            ToolName::ListSystems => serde_json::to_value(self.config.system_list())
                .map(ToolOutput::local)
                .map_err(|_| ToolError::Serialization),
            _ => self.call_service(tool, arguments),
        }
    }

    /// Runs a service tool and records its audit event.
    fn call_service(&self, tool: ToolName, arguments: Value) -> Result<ToolOutput, ToolError> {
        let started = Instant::now();
        let system_name = string_field(&arguments, "systemName");
        let target = self
            .config
            .resolve_system(system_name.as_deref().unwrap_or_default())
            .map_err(|err| ToolError::Config(err.to_string()));
        let outcome = target
            .as_ref()
            .map_err(ToolError::clone)
            .and_then(|target| self.run_operation(tool, target, arguments.clone()));

        if let Some(system_name) = system_name.filter(|name| !name.trim().is_empty()) {
            let error_message = match &outcome {
                Ok(result) => result.result.error_message().map(str::to_string),
                Err(err) => Some(err.to_string()),
            };
            let target = target.ok();
            let event = ServiceLogEvent::new(ServiceLogEventParams {
                system_name,
                method: tool.as_str().to_string(),
                logstore: string_field(&arguments, "logstore"),
                project: target.as_ref().map(|target| target.namespace().to_string()),
                endpoint: target.as_ref().map(|target| target.host().to_string()),
                parameters: arguments,
                duration_ms: started.elapsed().as_millis(),
                error_message,
            });
            self.sink.record(&event);
            self.history.record(&event);
        }
        outcome.map(ToolOutput::from)
    }

    /// Builds a client for `target` and runs one operation.
    fn run_operation(
        &self,
        tool: ToolName,
        target: &EndpointTarget,
        arguments: Value,
    ) -> Result<EchoedResult, ToolError> {
        let credentials =
            self.config.client_credentials().map_err(|err| ToolError::Config(err.to_string()))?;
        let client = LogStoreClient::new(
            target.clone(),
            credentials,
            Arc::clone(&self.transport),
            self.config.limits,
        )?
        .with_clock(Arc::clone(&self.clock));
        let defaults = &self.config.defaults;
        let now = self.clock.now_unix();

        let result = match tool {
            ToolName::ListLogstores => client.list_logstores()?,
            ToolName::GetProject => client.get_project()?,
            ToolName::GetLogging => client.get_logging()?,
            ToolName::GetIndex => client.get_index(&decode::<LogstoreArgs>(arguments)?.logstore)?,
            ToolName::GetLogstore => {
                client.get_logstore(&decode::<LogstoreArgs>(arguments)?.logstore)?
            }
            ToolName::ListShards => {
                client.list_shards(&decode::<LogstoreArgs>(arguments)?.logstore)?
            }
            ToolName::GetLogstoreMeteringMode => {
                client.get_logstore_metering_mode(&decode::<LogstoreArgs>(arguments)?.logstore)?
            }
            ToolName::GetLogs => client.get_logs(&self.log_query(decode(arguments)?, now)?)?,
            ToolName::QueryLogstoreLogs => {
                client.query_logstore_logs(&self.log_query(decode(arguments)?, now)?)?
            }
            ToolName::GetContextLogs => {
                let args: ContextLogArgs = decode(arguments)?;
                return Ok(client.get_context_logs(&ContextLogQuery {
                    logstore: args.logstore,
                    pack_id: args.pack_id,
                    pack_meta: args.pack_meta,
                    back_lines: args.back_lines.unwrap_or(defaults.back_lines),
                    forward_lines: args.forward_lines.unwrap_or(defaults.forward_lines),
                })?);
            }
            ToolName::GetHistograms => {
                let args: HistogramArgs = decode(arguments)?;
                let (from, to) =
                    resolve_window(args.from.as_ref(), args.to.as_ref(), now, defaults)?;
                client.get_histograms(&HistogramQuery {
                    logstore: args.logstore,
                    from,
                    to,
                    topic: args.topic,
                    query: args.query,
                })?
            }
            ToolName::ListProjects => {
                let args: ProjectListArgs = decode(arguments)?;
                client.list_projects(&ProjectListing {
                    project_name: args.project_name,
                    offset: args.offset.unwrap_or(defaults.offset),
                    size: args.size.unwrap_or(defaults.page_size),
                    resource_group_id: args.resource_group_id,
                })?
            }
            ToolName::QueryLogsBySql => {
                let args: SqlArgs = decode(arguments)?;
                client.query_logs_by_sql(&SqlQuery {
                    query: args.query,
                    power_sql: args.power_sql.unwrap_or(false),
                })?
            }
            ToolName::GetCursor => {
                let args: CursorArgs = decode(arguments)?;
                let position = self.cursor_position(&args.from)?;
                client.get_cursor(&args.logstore, args.shard_id, position)?
            }
            ToolName::GetCursorTime => {
                let args: CursorTimeArgs = decode(arguments)?;
                client.get_cursor_time(&args.logstore, args.shard_id, &args.cursor)?
            }
            ToolName::GetRawLogs => {
                let args: RawLogArgs = decode(arguments)?;
                let body = args.body;
                let (from, to) =
                    resolve_raw_window(body.from.as_ref(), body.to.as_ref(), now, defaults)?;
                return Ok(client.get_raw_logs(&RawLogRequest {
                    logstore: args.logstore,
                    from: Some(from),
                    to: Some(to),
                    query: body.query,
                    line: body.line,
                    offset: body.offset,
                    reverse: body.reverse,
                    power_sql: body.power_sql,
                })?);
            }
            ToolName::ListMachineGroups => {
                let args: PagedArgs = decode(arguments)?;
                client.list_machine_groups(&MachineGroupListing {
                    paging: self.paging(args.offset, args.size),
                    group_name: args.group_name,
                })?
            }
            ToolName::ListMachines => {
                let args: MachineGroupArgs = decode(arguments)?;
                client.list_machines(&args.machine_group, self.paging(args.offset, args.size))?
            }
            ToolName::GetMachineGroup => {
                client.get_machine_group(&decode::<MachineGroupArgs>(arguments)?.machine_group)?
            }
            ToolName::GetAppliedConfigs => {
                client.get_applied_configs(&decode::<MachineGroupArgs>(arguments)?.machine_group)?
            }
            ToolName::GetAppliedMachineGroups => client
                .get_applied_machine_groups(&decode::<ConfigNameArgs>(arguments)?.config_name)?,
            ToolName::DiagnoseConnection => {
                let args: DiagnoseArgs = decode(arguments)?;
                let logstore = args.logstore.as_deref().filter(|name| !name.trim().is_empty());
                client.diagnose_connection(logstore)?
            }
            ToolName::ListServiceLogs | ToolName::ListSystems => {
                return Err(ToolError::Internal(format!("{tool} is not a service call")));
            }
        };
        Ok(plain(result))
    }

    /// Builds a log query from search arguments and defaults.
    fn log_query(&self, args: LogSearchArgs, now: i64) -> Result<LogQuery, ToolError> {
        let defaults = &self.config.defaults;
        let (from, to) = resolve_window(args.from.as_ref(), args.to.as_ref(), now, defaults)?;
        Ok(LogQuery {
            logstore: args.logstore,
            from,
            to,
            query: args.query.unwrap_or_default(),
            line: args.line.unwrap_or(defaults.line),
            offset: args.offset.unwrap_or(defaults.offset),
            reverse: args.reverse.unwrap_or(false),
            power_sql: args.power_sql,
            topic: args.topic,
        })
    }

    /// Reads a cursor anchor.
    fn cursor_position(&self, value: &TimeArg) -> Result<CursorPosition, ToolError> {
        if let TimeArg::Text(text) = value {
            let text = text.trim();
            if text.eq_ignore_ascii_case("begin") {
                return Ok(CursorPosition::Begin);
            }
            if text.eq_ignore_ascii_case("end") {
                return Ok(CursorPosition::End);
            }
        }
        let offset = calendar_offset(&self.config.defaults)?;
        Ok(CursorPosition::At(parse_time("from", value, offset)?))
    }

    /// Fills a page window from defaults.
    fn paging(&self, offset: Option<u64>, size: Option<u32>) -> Paging {
        let defaults = &self.config.defaults;
        Paging::new(offset.unwrap_or(defaults.offset), size.unwrap_or(defaults.page_size))
    }
}

/// Builds the configured audit sink.
fn build_sink(config: &SlsConfig) -> Result<Arc<dyn ServiceLogSink>, ToolError> {
    match config.audit.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrServiceLogSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopServiceLogSink)),
        AuditSinkKind::File => {
            let path = config
                .audit
                .path
                .as_deref()
                .ok_or_else(|| {
                    ToolError::Config("audit.sink=file requires audit.path".to_string())
                })?;
            let sink = FileServiceLogSink::new(Path::new(path))
                .map_err(|err| ToolError::Config(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes tool arguments into a typed request.
fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Reads an optional string field from raw arguments.
fn string_field(arguments: &Value, name: &str) -> Option<String> {
    arguments.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Wraps a result without echo fields.
fn plain(result: NormalizedResult) -> EchoedResult {
    EchoedResult::new(result, Map::new())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool")]
    UnknownTool,
    /// Tool arguments failed to decode or parse.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// System resolution, credentials, or sink setup failed.
    #[error("config error: {0}")]
    Config(String),
    /// Client-side validation or configuration failed.
    #[error("{0}")]
    Client(String),
    /// Tool payload serialization failed.
    #[error("serialization failure")]
    Serialization,
    /// Internal routing error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ClientError> for ToolError {
    fn from(err: ClientError) -> Self {
        Self::Client(err.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
