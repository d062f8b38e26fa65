// crates/sls-mcp/src/audit.rs
// ============================================================================
// Module: Service Call Audit
// Description: Structured audit events for SLS tool calls.
// Purpose: Emit JSON-lines call records and keep a bounded history.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every routed tool call that names a system produces one
//! [`ServiceLogEvent`]. Events are written to a [`ServiceLogSink`] and kept in
//! a bounded [`ServiceLogHistory`] that backs the `list_service_logs` tool.
//! Parameters are the tool arguments as received; credentials never reach
//! this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Event label for service call records.
pub const SERVICE_CALL_EVENT: &str = "sls_service_call";

/// Default page size for history listings.
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 10;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Outcome of a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOutcome {
    /// The call returned a non-error result.
    Success,
    /// The call failed locally or remotely.
    Fail,
}

/// One recorded SLS service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLogEvent {
    /// Event label.
    pub event: String,
    /// Record time in unix milliseconds.
    pub timestamp_ms: u128,
    /// System name as supplied by the caller.
    pub system_name: String,
    /// Tool name.
    pub method: String,
    /// Logstore argument, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logstore: Option<String>,
    /// Resolved project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Resolved endpoint host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Tool arguments.
    pub parameters: Value,
    /// Wall-clock duration of the call.
    pub duration_ms: u128,
    /// Call outcome.
    pub result: CallOutcome,
    /// Failure description when the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Inputs for building a [`ServiceLogEvent`].
pub struct ServiceLogEventParams {
    /// System name as supplied by the caller.
    pub system_name: String,
    /// Tool name.
    pub method: String,
    /// Logstore argument, when present.
    pub logstore: Option<String>,
    /// Resolved project.
    pub project: Option<String>,
    /// Resolved endpoint host.
    pub endpoint: Option<String>,
    /// Tool arguments.
    pub parameters: Value,
    /// Wall-clock duration of the call.
    pub duration_ms: u128,
    /// Failure description; `None` means success.
    pub error_message: Option<String>,
}

impl ServiceLogEvent {
    /// Builds a service call event stamped with the current time.
    #[must_use]
    pub fn new(params: ServiceLogEventParams) -> Self {
        let result =
            if params.error_message.is_some() { CallOutcome::Fail } else { CallOutcome::Success };
        Self {
            event: SERVICE_CALL_EVENT.to_string(),
            timestamp_ms: now_millis(),
            system_name: params.system_name,
            method: params.method,
            logstore: params.logstore,
            project: params.project,
            endpoint: params.endpoint,
            parameters: params.parameters,
            duration_ms: params.duration_ms,
            result,
            error_message: params.error_message,
        }
    }
}

/// Returns the current unix time in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for service call events.
pub trait ServiceLogSink: Send + Sync {
    /// Records a service call event.
    fn record(&self, event: &ServiceLogEvent);
}

/// Audit sink that writes JSON lines to stderr.
pub struct StderrServiceLogSink;

impl ServiceLogSink for StderrServiceLogSink {
    fn record(&self, event: &ServiceLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileServiceLogSink {
    /// Output file guarded for concurrent writers.
    file: Mutex<File>,
}

impl FileServiceLogSink {
    /// Opens `path` for appending, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be opened.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ServiceLogSink for FileServiceLogSink {
    fn record(&self, event: &ServiceLogEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that drops all events.
pub struct NoopServiceLogSink;

impl ServiceLogSink for NoopServiceLogSink {
    fn record(&self, _event: &ServiceLogEvent) {}
}

// ============================================================================
// SECTION: History
// ============================================================================

/// Bounded in-memory record of recent service calls.
pub struct ServiceLogHistory {
    /// Maximum retained events.
    capacity: usize,
    /// Events, oldest first.
    entries: Mutex<VecDeque<ServiceLogEvent>>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLogPage {
    /// Events retained in total.
    pub total: usize,
    /// One-based page number.
    pub page: usize,
    /// Page size.
    pub size: usize,
    /// Events on this page.
    pub records: Vec<ServiceLogEvent>,
}

impl ServiceLogHistory {
    /// Creates a history retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Returns the number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    /// Returns true when no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a page of events, newest first.
    ///
    /// `page` starts at 1; zero is treated as 1. A zero `size` falls back to
    /// [`DEFAULT_HISTORY_PAGE_SIZE`].
    #[must_use]
    pub fn page(&self, page: usize, size: usize) -> ServiceLogPage {
        let page = page.max(1);
        let size = if size == 0 { DEFAULT_HISTORY_PAGE_SIZE } else { size };
        let Ok(entries) = self.entries.lock() else {
            return ServiceLogPage {
                total: 0,
                page,
                size,
                records: Vec::new(),
            };
        };
        let skip = (page - 1).saturating_mul(size);
        let records = entries.iter().rev().skip(skip).take(size).cloned().collect();
        ServiceLogPage {
            total: entries.len(),
            page,
            size,
            records,
        }
    }
}

impl ServiceLogSink for ServiceLogHistory {
    fn record(&self, event: &ServiceLogEvent) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(event.clone());
        }
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
        reason = "Test-only assertions."
    )]

    use serde_json::json;

    use super::*;

    fn event(method: &str, error: Option<&str>) -> ServiceLogEvent {
        ServiceLogEvent::new(ServiceLogEventParams {
            system_name: "ads".to_string(),
            method: method.to_string(),
            logstore: Some("app".to_string()),
            project: Some("ads-prod".to_string()),
            endpoint: Some("cn-hangzhou.log.aliyuncs.com".to_string()),
            parameters: json!({"logstore": "app"}),
            duration_ms: 12,
            error_message: error.map(str::to_string),
        })
    }

    #[test]
    fn outcome_follows_error_message() {
        assert_eq!(event("get_logs", None).result, CallOutcome::Success);
        assert_eq!(event("get_logs", Some("boom")).result, CallOutcome::Fail);
    }

    #[test]
    fn event_serializes_as_json_line() {
        let value = serde_json::to_value(event("get_index", None)).unwrap();
        assert_eq!(value["event"], "sls_service_call");
        assert_eq!(value["result"], "SUCCESS");
        assert_eq!(value["method"], "get_index");
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn history_pages_newest_first() {
        let history = ServiceLogHistory::new(10);
        for index in 0..5 {
            history.record(&event(&format!("call_{index}"), None));
        }
        let first = history.page(1, 2);
        assert_eq!(first.total, 5);
        let methods: Vec<_> = first.records.iter().map(|event| event.method.as_str()).collect();
        assert_eq!(methods, ["call_4", "call_3"]);
        let last = history.page(3, 2);
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.records[0].method, "call_0");
        assert!(history.page(4, 2).records.is_empty());
    }

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let history = ServiceLogHistory::new(2);
        history.record(&event("a", None));
        history.record(&event("b", None));
        history.record(&event("c", None));
        assert_eq!(history.len(), 2);
        let page = history.page(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.size, DEFAULT_HISTORY_PAGE_SIZE);
        let methods: Vec<_> = page.records.iter().map(|event| event.method.as_str()).collect();
        assert_eq!(methods, ["c", "b"]);
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileServiceLogSink::new(&path).unwrap();
        sink.record(&event("a", None));
        sink.record(&event("b", Some("denied")));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["result"], "FAIL");
        assert_eq!(second["error_message"], "denied");
    }
}
