// crates/sls-mcp/tests/router_end_to_end.rs
// ============================================================================
// Module: Router End-to-End Tests
// Description: Tool calls through the HTTP transport to a local server.
// Purpose: Verify alias routing, defaults, echo fields, and audit records.
// Dependencies: sls-mcp, sls-config, tiny_http, tempfile
// ============================================================================

//! ## Overview
//! Builds a [`ToolRouter`] from TOML the way the server does, pins the
//! project host to a `tiny_http` listener, and drives tool calls through the
//! real signed transport.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde_json::Value;
use serde_json::json;
use sls_config::SlsConfig;
use sls_mcp::ToolError;
use sls_mcp::ToolRouter;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Spawns a server answering `count` requests with `body`, reporting URLs.
fn spawn_server(
    body: &'static str,
    count: usize,
) -> (SocketAddr, mpsc::Receiver<String>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        for _ in 0..count {
            let Ok(request) = server.recv() else {
                return;
            };
            tx.send(request.url().to_string()).unwrap();
            let _ = request.respond(Response::from_string(body));
        }
    });
    (addr, rx, handle)
}

/// Builds a router whose `proj1` host resolves to `addr`.
fn router(addr: SocketAddr, audit_path: &Path) -> ToolRouter {
    let toml = format!(
        r#"
[credentials]
access_key_id = "AKID"
access_key_secret = "secret"

[[systems]]
name = "payments"
aliases = ["支付", "PAY"]
endpoint = "log.example.com"
project = "proj1"

[transport]
allow_http = true
read_timeout_ms = 5000
host_overrides = {{ "proj1.log.example.com" = "{addr}" }}

[audit]
sink = "file"
path = '{}'
"#,
        audit_path.display()
    );
    let config = SlsConfig::from_toml(&toml).unwrap();
    ToolRouter::from_config(config).unwrap()
}

/// Reads audit lines as JSON.
fn audit_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests that context lookups apply default line counts and echo the anchor.
#[test]
fn context_lookup_uses_defaults_and_echoes_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let (addr, rx, handle) = spawn_server(r#"{"logs":[],"total_lines":0}"#, 1);
    let router = router(addr, &audit);

    let value = router
        .handle_tool_call(
            "get_context_logs",
            json!({
                "systemName": "支付",
                "logstore": "app",
                "packId": "ABC-1",
                "packMeta": "0|MTY=|1|0",
            }),
        )
        .unwrap();
    handle.join().unwrap();

    assert_eq!(
        value,
        json!({"logs": [], "total_lines": 0, "pack_id": "ABC-1", "pack_meta": "0|MTY=|1|0"})
    );
    let url = rx.recv().unwrap();
    assert_eq!(
        url,
        "/logstores/app?type=context_log&pack_id=ABC-1&pack_meta=0%7CMTY%3D%7C1%7C0\
         &back_lines=70&forward_lines=30"
    );

    let lines = audit_lines(&audit);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event"], "sls_service_call");
    assert_eq!(lines[0]["system_name"], "支付");
    assert_eq!(lines[0]["method"], "get_context_logs");
    assert_eq!(lines[0]["project"], "proj1");
    assert_eq!(lines[0]["endpoint"], "log.example.com");
    assert_eq!(lines[0]["result"], "SUCCESS");
    assert!(!lines[0].to_string().contains("secret"));
}

/// Tests that raw log pulls take calendar times and echo the logstore.
#[test]
fn raw_logs_accept_calendar_times() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let (addr, rx, handle) = spawn_server(r#"[{"msg":"ok"}]"#, 1);
    let router = router(addr, &audit);

    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let value = router
        .handle_tool_call(
            "get_raw_logs",
            json!({
                "systemName": "pay",
                "logstore": "app",
                "body": { "from": now - 600, "to": now, "query": "level:ERROR", "line": 5 },
            }),
        )
        .unwrap();
    handle.join().unwrap();

    assert_eq!(value, json!({"data": [{"msg": "ok"}], "logstore": "app"}));
    let url = rx.recv().unwrap();
    assert_eq!(url, format!("/logstores/app/logs?from={}&to={now}&line=5", now - 600));
}

/// Tests that a failed upstream call is recorded as FAIL and listed.
#[test]
fn upstream_failure_is_audited_and_listed() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let _ = request.respond(Response::from_string("denied").with_status_code(403));
        }
    });
    let router = router(addr, &audit);

    let output = router.invoke("get_logging", json!({"systemName": "payments"})).unwrap();
    handle.join().unwrap();
    assert!(output.is_error);
    assert_eq!(output.value, json!({"error": "denied"}));

    let err = router
        .handle_tool_call("list_shards", json!({"systemName": "payments", "logstore": " "}))
        .unwrap_err();
    assert!(matches!(err, ToolError::Client(_)), "{err}");

    let page = router.handle_tool_call("list_service_logs", json!({"page": 1})).unwrap();
    assert_eq!(page["total"], 2);
    assert_eq!(page["size"], 10);
    assert_eq!(page["records"][0]["method"], "list_shards");
    assert_eq!(page["records"][1]["method"], "get_logging");
    assert_eq!(page["records"][1]["result"], "FAIL");
    assert_eq!(page["records"][1]["error_message"], "denied");

    let lines = audit_lines(&audit);
    assert_eq!(lines.len(), 2);
}
