// crates/deskflow-gateway/tests/http_backend.rs
// ============================================================================
// Module: HTTP Backend Tests
// Description: Wire-level tests for the chat-completion HTTP backend.
// Purpose: Verify response parsing and status classification on the wire.
// Dependencies: deskflow-core, deskflow-gateway, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Wire-level tests for the chat-completion HTTP backend, covering response
//! parsing and status classification on the wire.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::thread;
use std::time::Duration;

use deskflow_core::ChatMessage;
use deskflow_core::GenerationParams;
use deskflow_core::OutputFormat;
use deskflow_core::ProviderError;
use deskflow_core::ProviderRequest;
use deskflow_core::interfaces::ChatBackend;
use deskflow_gateway::HttpChatBackend;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Serves exactly one canned response and returns the endpoint URL.
fn one_shot_server(status: u16, body: &str, headers: Vec<Header>) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/v1/chat/completions");
    let body = body.to_string();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let mut response = Response::from_string(body).with_status_code(status);
            for header in headers {
                response.add_header(header);
            }
            let _ = request.respond(response);
        }
    });
    (url, handle)
}

fn sample_request() -> ProviderRequest {
    ProviderRequest {
        model: "default".to_string(),
        messages: vec![ChatMessage::user("hello")],
        params: GenerationParams::default(),
        format: OutputFormat::Text,
    }
}

fn backend(url: &str) -> HttpChatBackend {
    HttpChatBackend::new("test", url, Some("secret".to_string())).unwrap()
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn successful_completion_parses_content_and_usage() {
    let body = r#"{
        "choices": [{"message": {"content": "the answer"}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3}
    }"#;
    let (url, handle) = one_shot_server(200, body, Vec::new());
    let response = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap();
    handle.join().unwrap();
    assert_eq!(response.content, "the answer");
    assert_eq!(response.usage.unwrap().prompt_tokens, 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_choices_is_a_server_error() {
    let (url, handle) = one_shot_server(200, r#"{"choices": []}"#, Vec::new());
    let err = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    handle.join().unwrap();
    assert_eq!(err.kind(), "provider_server_error");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_a_server_error() {
    let (url, handle) = one_shot_server(200, "not json", Vec::new());
    let err = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    handle.join().unwrap();
    assert_eq!(err.kind(), "provider_server_error");
}

// ============================================================================
// SECTION: Status Classification
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn rate_limit_maps_to_overloaded_with_hint() {
    let header = Header::from_bytes(&b"Retry-After"[..], &b"2"[..]).unwrap();
    let (url, handle) = one_shot_server(429, "", vec![header]);
    let err = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    handle.join().unwrap();
    match err {
        ProviderError::Overloaded { retry_after_ms } => {
            assert_eq!(retry_after_ms, Some(2_000));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn server_failure_maps_to_server_error() {
    let (url, handle) = one_shot_server(503, "", Vec::new());
    let err = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    handle.join().unwrap();
    match err {
        ProviderError::Server { status, .. } => assert_eq!(status, Some(503)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_request_maps_to_client_error() {
    let (url, handle) = one_shot_server(401, "", Vec::new());
    let err = backend(&url)
        .complete(&sample_request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    handle.join().unwrap();
    match err {
        ProviderError::Client { status, .. } => assert_eq!(status, 401),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_endpoint_is_not_a_client_error() {
    // Port 1 is not listening; the transport failure must stay retryable.
    let err = backend("http://127.0.0.1:1/v1/chat/completions")
        .complete(&sample_request(), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}
