// crates/sls-client/tests/signed_requests.rs
// ============================================================================
// Module: Signed Request Tests
// Description: End-to-end checks against a local HTTP server.
// Purpose: Verify paths, query strings, headers, and signatures on the wire.
// Dependencies: sls-client, tiny_http
// ============================================================================

//! ## Overview
//! Runs real operations through [`HttpTransport`] against a `tiny_http`
//! server. The project host is pinned to the local listener so the signed
//! `Host` header still names the project endpoint.

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use serde_json::json;
use sls_client::ClientLimits;
use sls_client::Credentials;
use sls_client::EndpointTarget;
use sls_client::FixedClock;
use sls_client::HttpMethod;
use sls_client::HttpTransport;
use sls_client::LogQuery;
use sls_client::LogStoreClient;
use sls_client::NormalizedResult;
use sls_client::QueryParams;
use sls_client::RawLogRequest;
use sls_client::RequestDescriptor;
use sls_client::RequestSigner;
use sls_client::TransportConfig;
use sls_client::UrlScheme;
use sls_client::build_signable_request;
use time::OffsetDateTime;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Frozen request time.
const NOW: i64 = 1_700_003_600;

/// Request observed by the local server.
struct Captured {
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
    body: String,
}

/// Spawns a one-shot server replying with `body` and `status`.
fn spawn_server(
    body: &'static str,
    status: u16,
    extra_headers: Vec<(&'static str, &'static str)>,
) -> (std::net::SocketAddr, mpsc::Receiver<Captured>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        if let Ok(mut request) = server.recv() {
            let mut payload = String::new();
            request.as_reader().read_to_string(&mut payload).unwrap();
            let headers = request
                .headers()
                .iter()
                .map(|header| {
                    (header.field.to_string().to_ascii_lowercase(), header.value.to_string())
                })
                .collect();
            tx.send(Captured {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers,
                body: payload,
            })
            .unwrap();
            let mut response = Response::from_string(body).with_status_code(status);
            for (name, value) in extra_headers {
                response = response
                    .with_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
            }
            let _ = request.respond(response);
        }
    });
    (addr, rx, handle)
}

/// Builds a client whose project host resolves to `addr`.
fn local_client(addr: std::net::SocketAddr) -> LogStoreClient {
    let mut config = TransportConfig {
        scheme: UrlScheme::Http,
        read_timeout_ms: 5_000,
        ..TransportConfig::default()
    };
    config.host_overrides.insert("proj1.log.example.com".to_string(), addr);
    let transport = HttpTransport::new(config).unwrap();
    LogStoreClient::new(
        EndpointTarget::new("log.example.com", "proj1").unwrap(),
        Credentials::new("AKID", "secret"),
        Arc::new(transport),
        ClientLimits::default(),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock::from_unix(NOW)))
}

/// Recomputes the authorization header for a descriptor.
fn expected_authorization(descriptor: &RequestDescriptor) -> String {
    let target = EndpointTarget::new("log.example.com", "proj1").unwrap();
    let now = OffsetDateTime::from_unix_timestamp(NOW).unwrap();
    let signable = build_signable_request(descriptor, now, &target).unwrap();
    let signer = RequestSigner::new(Credentials::new("AKID", "secret")).unwrap();
    let signature = signer.sign(signable.canonical_string()).unwrap();
    signer.authorization(&signature)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests the full log search round trip and its signature.
#[test]
fn log_search_round_trip_is_signed() {
    let (addr, rx, handle) = spawn_server(r#"{"logs":[{"msg":"ERROR disk"}]}"#, 200, Vec::new());
    let client = local_client(addr);

    let query = LogQuery::new("app", 1_700_000_000, 1_700_003_600, "ERROR");
    let result = client.get_logs(&query).unwrap();
    assert_eq!(result.into_value(), json!({"logs": [{"msg": "ERROR disk"}]}));

    let captured = rx.recv().unwrap();
    handle.join().unwrap();
    assert_eq!(captured.method, "GET");
    assert_eq!(
        captured.url,
        "/logstores/app?type=log&from=1700000000&to=1700003600\
         &query=%22ERROR%22+%7C+with_pack_meta&line=100&offset=0&reverse=false"
    );
    assert_eq!(captured.headers["host"], "proj1.log.example.com");
    assert_eq!(captured.headers["date"], "Tue, 14 Nov 2023 23:13:20 GMT");
    assert_eq!(captured.headers["x-log-apiversion"], "0.6.0");
    assert_eq!(captured.headers["x-log-signaturemethod"], "hmac-sha1");
    assert_eq!(captured.headers["accept"], "application/json");

    let params: QueryParams = [
        ("type", "log"),
        ("from", "1700000000"),
        ("to", "1700003600"),
        ("query", "\"ERROR\" | with_pack_meta"),
        ("line", "100"),
        ("offset", "0"),
        ("reverse", "false"),
    ]
    .into_iter()
    .collect();
    let descriptor = RequestDescriptor::get("/logstores/app").with_query(params);
    assert_eq!(captured.headers["authorization"], expected_authorization(&descriptor));
}

/// Tests that the raw log POST carries a signed body digest.
#[test]
fn raw_log_post_signs_body() {
    let (addr, rx, handle) = spawn_server(r#"[{"a":1}]"#, 200, Vec::new());
    let client = local_client(addr);

    let request = RawLogRequest {
        logstore: "app".to_string(),
        from: Some(1_700_000_000),
        to: Some(1_700_003_600),
        query: Some("level:ERROR".to_string()),
        reverse: Some(true),
        ..RawLogRequest::default()
    };
    let result = client.get_raw_logs(&request).unwrap();
    assert_eq!(result.into_value(), json!({"data": [{"a": 1}], "logstore": "app"}));

    let captured = rx.recv().unwrap();
    handle.join().unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/logstores/app/logs?from=1700000000&to=1700003600&reverse=true");
    assert_eq!(captured.body, r#"{"query":"level:ERROR"}"#);
    assert_eq!(captured.headers["x-log-bodyrawsize"], captured.body.len().to_string());

    let descriptor = RequestDescriptor::post("/logstores/app/logs", captured.body.into_bytes())
        .with_query(
            [("from", "1700000000"), ("to", "1700003600"), ("reverse", "true")]
                .into_iter()
                .collect(),
        );
    assert_eq!(descriptor.method(), HttpMethod::Post);
    assert_eq!(captured.headers["authorization"], expected_authorization(&descriptor));
}

/// Tests that upstream error statuses surface the body as an error.
#[test]
fn upstream_error_is_normalized() {
    let (addr, _rx, handle) = spawn_server("not found", 404, Vec::new());
    let client = local_client(addr);
    let result = client.get_logstore("missing").unwrap();
    handle.join().unwrap();
    assert_eq!(result, NormalizedResult::Error("not found".to_string()));
}

/// Tests that log pages pick up count and progress headers.
#[test]
fn log_page_uses_response_headers() {
    let (addr, _rx, handle) = spawn_server(
        r#"[{"a":"1"}]"#,
        200,
        vec![("x-log-count", "1"), ("x-log-progress", "Incomplete")],
    );
    let client = local_client(addr);
    let query = LogQuery::new("app", NOW - 60, NOW, "*");
    let result = client.get_logs(&query).unwrap();
    handle.join().unwrap();
    assert_eq!(
        result.into_value(),
        json!({"count": 1, "logs": [{"a": "1"}], "progress": "Incomplete"})
    );
}

/// Tests that a closed port yields a transport error result.
#[test]
fn refused_connection_is_an_error_result() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    drop(server);
    let client = local_client(addr);
    let result = client.list_logstores().unwrap();
    assert!(result.is_error(), "{result:?}");
}
