// crates/deskflow-gateway/tests/gateway_retry.rs
// ============================================================================
// Module: Gateway Retry Tests
// Description: Retry-loop behavior against a scripted backend.
// Purpose: Verify attempt accounting, deadline aborts, and classification.
// Dependencies: deskflow-core, deskflow-gateway, tokio
// ============================================================================

//! ## Overview
//! Retry-loop behavior against a scripted backend, covering attempt
//! accounting, deadline aborts, and error classification.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use deskflow_core::ChatMessage;
use deskflow_core::GatewayError;
use deskflow_core::GenerationParams;
use deskflow_core::OutputFormat;
use deskflow_core::ProviderError;
use deskflow_core::ProviderRequest;
use deskflow_core::ProviderResponse;
use deskflow_core::interfaces::ChatBackend;
use deskflow_core::interfaces::ChatCompleter;
use deskflow_gateway::GuardrailConfig;
use deskflow_gateway::Guardrails;
use deskflow_gateway::ModelGateway;
use deskflow_gateway::RetryPolicy;
use tokio::time::Instant;

/// Backend that replays a scripted sequence of attempt outcomes.
struct ScriptedBackend {
    /// Remaining outcomes, consumed front to back.
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    /// Attempts observed so far.
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(outcomes: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .expect("outcome lock poisoned")
            .pop_front()
            .expect("backend called more times than scripted");
        outcome.map(|content| ProviderResponse {
            content,
            usage: None,
        })
    }
}

fn text_request() -> ProviderRequest {
    ProviderRequest {
        model: "default".to_string(),
        messages: vec![ChatMessage::user("summarize the incident")],
        params: GenerationParams::default(),
        format: OutputFormat::Text,
    }
}

fn gateway(backend: Arc<ScriptedBackend>, retry: RetryPolicy) -> ModelGateway {
    ModelGateway::new(backend, Guardrails::new(GuardrailConfig::default()), retry)
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_until_success() {
    let backend = ScriptedBackend::new(vec![
        Err(ProviderError::Overloaded {
            retry_after_ms: None,
        }),
        Err(ProviderError::Server {
            status: Some(502),
            message: "bad gateway".to_string(),
        }),
        Ok("recovered".to_string()),
    ]);
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    let deadline = Instant::now() + Duration::from_secs(30);
    let response = gateway.complete(text_request(), deadline).await.unwrap();
    assert_eq!(response.content, "recovered");
    assert_eq!(backend.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_never_retried() {
    let backend = ScriptedBackend::new(vec![Err(ProviderError::Client {
        status: 401,
        message: "bad credentials".to_string(),
    })]);
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    let deadline = Instant::now() + Duration::from_secs(30);
    let err = gateway.complete(text_request(), deadline).await.unwrap_err();
    match err {
        GatewayError::Provider { attempts, last } => {
            assert_eq!(attempts, 1);
            assert_eq!(last.kind(), "provider_client_error");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_surfaces_the_last_classified_error() {
    let overloaded = || {
        Err(ProviderError::Overloaded {
            retry_after_ms: None,
        })
    };
    let backend = ScriptedBackend::new(vec![overloaded(), overloaded(), overloaded()]);
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    let deadline = Instant::now() + Duration::from_secs(60);
    let err = gateway.complete(text_request(), deadline).await.unwrap_err();
    match err {
        GatewayError::Provider { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.kind(), "provider_overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_mid_retry_as_timeout() {
    let backend = ScriptedBackend::new(vec![Err(ProviderError::Overloaded {
        retry_after_ms: Some(10_000),
    })]);
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    // The retry-after hint pushes the next attempt past the deadline.
    let deadline = Instant::now() + Duration::from_secs(2);
    let err = gateway.complete(text_request(), deadline).await.unwrap_err();
    match err {
        GatewayError::Provider { attempts, last } => {
            assert_eq!(attempts, 1);
            assert_eq!(last.kind(), "provider_timeout");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_short_circuits_before_any_attempt() {
    let backend = ScriptedBackend::new(Vec::new());
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    let deadline = Instant::now();
    let err = gateway.complete(text_request(), deadline).await.unwrap_err();
    match err {
        GatewayError::Provider { attempts, last } => {
            assert_eq!(attempts, 0);
            assert_eq!(last.kind(), "provider_timeout");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn guardrail_violations_never_reach_the_backend() {
    let backend = ScriptedBackend::new(Vec::new());
    let guardrails = Guardrails::new(GuardrailConfig {
        blocklist: vec!["incident".to_string()],
        ..GuardrailConfig::default()
    });
    let gateway = ModelGateway::new(
        Arc::clone(&backend) as Arc<dyn ChatBackend>,
        guardrails,
        RetryPolicy::default(),
    );
    let deadline = Instant::now() + Duration::from_secs(30);
    let err = gateway.complete(text_request(), deadline).await.unwrap_err();
    assert!(matches!(err, GatewayError::Guardrail { reason } if reason == "blocked_phrase"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn structured_output_must_be_valid_json() {
    let backend = ScriptedBackend::new(vec![Ok("not json at all".to_string())]);
    let gateway = gateway(Arc::clone(&backend), RetryPolicy::default());
    let mut request = text_request();
    request.format = OutputFormat::Json;
    let deadline = Instant::now() + Duration::from_secs(30);
    let err = gateway.complete(request, deadline).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidOutput(_)));
}
