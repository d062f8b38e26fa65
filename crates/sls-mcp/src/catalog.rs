// crates/sls-mcp/src/catalog.rs
// ============================================================================
// Module: Tool Catalog
// Description: Canonical tool names and their input schemas.
// Purpose: Single source for `tools/list` and tool-name dispatch.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Tool names are snake_case and stable. Arguments are camelCase JSON objects;
//! every service tool takes a `systemName` that is resolved through the
//! configured alias table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// List logstores in a project.
    ListLogstores,
    /// Search logs with pack metadata.
    GetLogs,
    /// Search logs with optional SQL engine and topic.
    QueryLogstoreLogs,
    /// Fetch entries around one log.
    GetContextLogs,
    /// Fetch a logstore index.
    GetIndex,
    /// Fetch project details.
    GetProject,
    /// Fetch log count histograms.
    GetHistograms,
    /// List projects.
    ListProjects,
    /// Run a project-level SQL query.
    QueryLogsBySql,
    /// Fetch the project service-log settings.
    GetLogging,
    /// Fetch logstore details.
    GetLogstore,
    /// List logstore shards.
    ListShards,
    /// Resolve a shard cursor.
    GetCursor,
    /// Resolve the server time of a cursor.
    GetCursorTime,
    /// Pull raw logs through the POST endpoint.
    GetRawLogs,
    /// Fetch the logstore metering mode.
    GetLogstoreMeteringMode,
    /// List machine groups.
    ListMachineGroups,
    /// List machines in a group.
    ListMachines,
    /// Fetch a machine group.
    GetMachineGroup,
    /// List configs applied to a machine group.
    GetAppliedConfigs,
    /// List machine groups a config is applied to.
    GetAppliedMachineGroups,
    /// Probe connectivity for a system.
    DiagnoseConnection,
    /// Page through recorded service calls.
    ListServiceLogs,
    /// List configured systems and aliases.
    ListSystems,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListLogstores => "list_logstores",
            Self::GetLogs => "get_logs",
            Self::QueryLogstoreLogs => "query_logstore_logs",
            Self::GetContextLogs => "get_context_logs",
            Self::GetIndex => "get_index",
            Self::GetProject => "get_project",
            Self::GetHistograms => "get_histograms",
            Self::ListProjects => "list_projects",
            Self::QueryLogsBySql => "query_logs_by_sql",
            Self::GetLogging => "get_logging",
            Self::GetLogstore => "get_logstore",
            Self::ListShards => "list_shards",
            Self::GetCursor => "get_cursor",
            Self::GetCursorTime => "get_cursor_time",
            Self::GetRawLogs => "get_raw_logs",
            Self::GetLogstoreMeteringMode => "get_logstore_metering_mode",
            Self::ListMachineGroups => "list_machine_groups",
            Self::ListMachines => "list_machines",
            Self::GetMachineGroup => "get_machine_group",
            Self::GetAppliedConfigs => "get_applied_configs",
            Self::GetAppliedMachineGroups => "get_applied_machine_groups",
            Self::DiagnoseConnection => "diagnose_connection",
            Self::ListServiceLogs => "list_service_logs",
            Self::ListSystems => "list_systems",
        }
    }

    /// Returns all tool names in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ListLogstores,
            Self::GetLogs,
            Self::QueryLogstoreLogs,
            Self::GetContextLogs,
            Self::GetIndex,
            Self::GetProject,
            Self::GetHistograms,
            Self::ListProjects,
            Self::QueryLogsBySql,
            Self::GetLogging,
            Self::GetLogstore,
            Self::ListShards,
            Self::GetCursor,
            Self::GetCursorTime,
            Self::GetRawLogs,
            Self::GetLogstoreMeteringMode,
            Self::ListMachineGroups,
            Self::ListMachines,
            Self::GetMachineGroup,
            Self::GetAppliedConfigs,
            Self::GetAppliedMachineGroups,
            Self::DiagnoseConnection,
            Self::ListServiceLogs,
            Self::ListSystems,
        ]
    }

    /// Parses a tool name from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|tool| tool.as_str() == name)
    }

    /// Returns true for tools that call the remote service.
    #[must_use]
    pub const fn is_service_call(self) -> bool {
        !matches!(self, Self::ListServiceLogs | Self::ListSystems)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Tool definition advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    pub input_schema: Value,
}

/// Returns definitions for every tool in canonical order.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all()
        .iter()
        .map(|tool| ToolDefinition {
            name: *tool,
            description: description(*tool).to_string(),
            input_schema: input_schema(*tool),
        })
        .collect()
}

/// Returns the client-facing description of a tool.
const fn description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::ListLogstores => "List all logstores in the system's project.",
        ToolName::GetLogs => {
            "Search logs in a time range. Bare terms are quoted; results carry pack metadata \
             for context lookups."
        }
        ToolName::QueryLogstoreLogs => {
            "Search or analyze logs with an optional topic filter and the dedicated SQL engine."
        }
        ToolName::GetContextLogs => {
            "Fetch entries before and after one log, identified by its pack id and pack meta."
        }
        ToolName::GetIndex => "Fetch the index configuration of a logstore.",
        ToolName::GetProject => "Fetch project details for a system.",
        ToolName::GetHistograms => "Fetch log count distribution over a time range.",
        ToolName::ListProjects => "List projects visible to the configured credentials.",
        ToolName::QueryLogsBySql => "Run a project-level SQL query across logstores.",
        ToolName::GetLogging => "Fetch the project's service-log settings.",
        ToolName::GetLogstore => "Fetch logstore details.",
        ToolName::ListShards => "List the shards of a logstore.",
        ToolName::GetCursor => "Resolve a shard cursor at begin, end, or a unix timestamp.",
        ToolName::GetCursorTime => "Resolve the server time of a shard cursor.",
        ToolName::GetRawLogs => "Pull raw logs in a time range (defaults to the last day).",
        ToolName::GetLogstoreMeteringMode => "Fetch the metering mode of a logstore.",
        ToolName::ListMachineGroups => "List machine groups.",
        ToolName::ListMachines => "List machines in a machine group.",
        ToolName::GetMachineGroup => "Fetch a machine group.",
        ToolName::GetAppliedConfigs => "List configs applied to a machine group.",
        ToolName::GetAppliedMachineGroups => "List machine groups a config is applied to.",
        ToolName::DiagnoseConnection => {
            "Probe credentials and connectivity for a system, optionally through one logstore."
        }
        ToolName::ListServiceLogs => "Page through recorded service calls, newest first.",
        ToolName::ListSystems => "List configured systems and their aliases.",
    }
}

/// Returns the input schema of a tool.
fn input_schema(tool: ToolName) -> Value {
    let system = ("systemName", string_prop("System name or alias from configuration."));
    let logstore = ("logstore", string_prop("Logstore name."));
    let from = ("from", time_prop("Range start; defaults to the configured lookback."));
    let to = ("to", time_prop("Range end; defaults to now."));
    let query = ("query", string_prop("Search expression; blank matches everything."));
    let topic = ("topic", string_prop("Log topic filter."));
    let offset = ("offset", integer_prop("Page offset.", 0));
    let size = ("size", integer_prop("Page size.", 1));
    let machine_group = ("machineGroup", string_prop("Machine group name."));
    match tool {
        ToolName::ListLogstores | ToolName::GetProject | ToolName::GetLogging => {
            object_schema(vec![system], &["systemName"])
        }
        ToolName::GetIndex
        | ToolName::GetLogstore
        | ToolName::ListShards
        | ToolName::GetLogstoreMeteringMode => {
            object_schema(vec![system, logstore], &["systemName", "logstore"])
        }
        ToolName::GetLogs => object_schema(
            vec![
                system,
                logstore,
                from,
                to,
                query,
                ("line", integer_prop("Page size.", 1)),
                offset,
                ("reverse", bool_prop("Newest first when true.")),
            ],
            &["systemName", "logstore"],
        ),
        ToolName::QueryLogstoreLogs => object_schema(
            vec![
                system,
                logstore,
                from,
                to,
                query,
                ("line", integer_prop("Page size.", 1)),
                offset,
                ("reverse", bool_prop("Newest first when true.")),
                ("powerSql", bool_prop("Use the dedicated SQL engine.")),
                topic,
            ],
            &["systemName", "logstore"],
        ),
        ToolName::GetContextLogs => object_schema(
            vec![
                system,
                logstore,
                ("packId", string_prop("Pack id of the anchor log.")),
                ("packMeta", string_prop("Pack meta of the anchor log.")),
                ("backLines", integer_prop("Entries before the anchor.", 0)),
                ("forwardLines", integer_prop("Entries after the anchor.", 0)),
            ],
            &["systemName", "logstore", "packId", "packMeta"],
        ),
        ToolName::GetHistograms => object_schema(
            vec![system, logstore, from, to, topic, query],
            &["systemName", "logstore"],
        ),
        ToolName::ListProjects => object_schema(
            vec![
                system,
                ("projectName", string_prop("Project name filter.")),
                offset,
                size,
                ("resourceGroupId", string_prop("Resource group filter.")),
            ],
            &["systemName"],
        ),
        ToolName::QueryLogsBySql => object_schema(
            vec![
                system,
                ("query", string_prop("SQL text, sent as written.")),
                ("powerSql", bool_prop("Use the dedicated SQL engine.")),
            ],
            &["systemName", "query"],
        ),
        ToolName::GetCursor => object_schema(
            vec![
                system,
                logstore,
                ("shardId", integer_prop("Shard id.", 0)),
                ("from", cursor_prop()),
            ],
            &["systemName", "logstore", "shardId", "from"],
        ),
        ToolName::GetCursorTime => object_schema(
            vec![
                system,
                logstore,
                ("shardId", integer_prop("Shard id.", 0)),
                ("cursor", string_prop("Shard cursor.")),
            ],
            &["systemName", "logstore", "shardId", "cursor"],
        ),
        ToolName::GetRawLogs => object_schema(
            vec![system, logstore, ("body", raw_body_schema())],
            &["systemName", "logstore"],
        ),
        ToolName::ListMachineGroups => object_schema(
            vec![system, offset, size, ("groupName", string_prop("Group name filter."))],
            &["systemName"],
        ),
        ToolName::ListMachines => object_schema(
            vec![system, machine_group, offset, size],
            &["systemName", "machineGroup"],
        ),
        ToolName::GetMachineGroup | ToolName::GetAppliedConfigs => {
            object_schema(vec![system, machine_group], &["systemName", "machineGroup"])
        }
        ToolName::GetAppliedMachineGroups => object_schema(
            vec![system, ("configName", string_prop("Logtail config name."))],
            &["systemName", "configName"],
        ),
        ToolName::DiagnoseConnection => object_schema(
            vec![system, ("logstore", string_prop("Optional logstore to probe."))],
            &["systemName"],
        ),
        ToolName::ListServiceLogs => object_schema(
            vec![
                ("page", integer_prop("One-based page number.", 1)),
                ("size", integer_prop("Page size, default 10.", 1)),
            ],
            &[],
        ),
        ToolName::ListSystems => object_schema(Vec::new(), &[]),
    }
}

/// Schema for the raw-log request body.
fn raw_body_schema() -> Value {
    object_schema(
        vec![
            ("from", time_prop("Range start; defaults to one day before `to`.")),
            ("to", time_prop("Range end; defaults to now.")),
            ("query", string_prop("Search expression; defaults to `*`.")),
            ("line", integer_prop("Page size.", 1)),
            ("offset", integer_prop("Page offset.", 0)),
            ("reverse", bool_prop("Newest first when true.")),
            ("powerSql", bool_prop("Use the dedicated SQL engine.")),
        ],
        &[],
    )
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Builds an object schema from named properties.
fn object_schema(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let properties: Map<String, Value> =
        properties.into_iter().map(|(name, schema)| (name.to_string(), schema)).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// String property schema.
fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// Integer property schema with a lower bound.
fn integer_prop(description: &str, minimum: u64) -> Value {
    json!({ "type": "integer", "minimum": minimum, "description": description })
}

/// Boolean property schema.
fn bool_prop(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

/// Time property schema accepting epoch numbers and calendar strings.
fn time_prop(description: &str) -> Value {
    json!({
        "description": description,
        "oneOf": [
            { "type": "integer", "description": "Epoch seconds or milliseconds." },
            { "type": "string", "description": "Epoch digits, YYYY-MM-DD, or YYYY-MM-DD HH:MM:SS." },
        ],
    })
}

/// Cursor anchor schema.
fn cursor_prop() -> Value {
    json!({
        "description": "Cursor anchor: begin, end, or a time.",
        "oneOf": [
            { "type": "string", "enum": ["begin", "end"] },
            { "type": "integer" },
            { "type": "string" },
        ],
    })
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
        reason = "Test-only assertions."
    )]

    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        let mut seen = BTreeSet::new();
        for tool in ToolName::all() {
            assert_eq!(ToolName::parse(tool.as_str()), Some(*tool));
            assert!(seen.insert(tool.as_str()), "duplicate name {tool}");
        }
        assert_eq!(seen.len(), 24);
        assert_eq!(ToolName::parse("drop_logstore"), None);
    }

    #[test]
    fn definitions_require_system_for_service_tools() {
        for definition in tool_definitions() {
            let required = definition.input_schema["required"].as_array().unwrap();
            let has_system = required.iter().any(|name| name == "systemName");
            assert_eq!(has_system, definition.name.is_service_call(), "{}", definition.name);
        }
    }

    #[test]
    fn definitions_serialize_with_snake_case_names() {
        let value = serde_json::to_value(tool_definitions()).unwrap();
        assert_eq!(value[0]["name"], "list_logstores");
        assert_eq!(value[2]["input_schema"]["properties"]["powerSql"]["type"], "boolean");
    }
}
