// crates/deskflow-gateway/src/http.rs
// ============================================================================
// Module: HTTP Chat Backend
// Description: Chat-completion backend over an OpenAI-style HTTP endpoint.
// Purpose: Classify transport and status outcomes into provider errors.
// Dependencies: deskflow-core, reqwest, url
// ============================================================================

//! ## Overview
//! The HTTP backend speaks the common chat-completions wire shape: one POST
//! per attempt carrying the model, messages, and generation parameters. The
//! classification is the heart of the module — the retry loop upstream only
//! sees [`ProviderError`] kinds, so every transport and status outcome must
//! land in exactly one of them. Redirects are disabled; a provider endpoint
//! that redirects is misconfigured, not retryable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use deskflow_core::ProviderError;
use deskflow_core::ProviderRequest;
use deskflow_core::ProviderResponse;
use deskflow_core::TokenUsage;
use deskflow_core::interfaces::ChatBackend;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User agent sent on every provider request.
const USER_AGENT: &str = concat!("deskflow/", env!("CARGO_PKG_VERSION"));

/// Header carrying the provider's retry hint in seconds.
const RETRY_AFTER_HEADER: &str = "retry-after";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors constructing an HTTP backend.
#[derive(Debug, Error)]
pub enum HttpBackendError {
    /// The endpoint URL failed to parse.
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    /// The underlying HTTP client failed to build.
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Outbound chat-completion request body.
#[derive(Serialize)]
struct WireRequest<'a> {
    /// Model identifier.
    model: &'a str,
    /// Conversation messages.
    messages: &'a [deskflow_core::ChatMessage],
    /// Completion length cap.
    max_tokens: u32,
    /// Sampling temperature.
    temperature: f32,
}

/// Inbound chat-completion response body.
#[derive(Deserialize)]
struct WireResponse {
    /// Candidate completions; the first is used.
    choices: Vec<WireChoice>,
    /// Token accounting, when the provider reports it.
    usage: Option<WireUsage>,
}

/// One completion candidate.
#[derive(Deserialize)]
struct WireChoice {
    /// The completion message.
    message: WireMessage,
}

/// The completion message payload.
#[derive(Deserialize)]
struct WireMessage {
    /// Completion text.
    content: String,
}

/// Provider-reported token counts.
#[derive(Deserialize)]
struct WireUsage {
    /// Tokens consumed by the prompt.
    prompt_tokens: u32,
    /// Tokens produced in the completion.
    completion_tokens: u32,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Chat backend over an OpenAI-style completions endpoint.
///
/// # Invariants
/// - One HTTP request per `complete` call; retries live upstream.
/// - Redirects are never followed.
pub struct HttpChatBackend {
    /// Backend name used for static routing.
    name: String,
    /// Completions endpoint.
    endpoint: Url,
    /// Bearer token sent with every request, when configured.
    api_key: Option<String>,
    /// Shared HTTP client.
    client: Client,
}

impl HttpChatBackend {
    /// Creates a backend for the given completions endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HttpBackendError`] when the endpoint does not parse or the
    /// HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        endpoint: &str,
        api_key: Option<String>,
    ) -> Result<Self, HttpBackendError> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            name: name.into(),
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
        };
        let mut outbound = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            outbound = outbound.bearer_auth(key);
        }
        let response = outbound.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &response));
        }
        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Server {
                status: Some(status.as_u16()),
                message: format!("malformed response body: {err}"),
            })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Server {
                status: Some(status.as_u16()),
                message: "response carried no choices".to_string(),
            })?;
        Ok(ProviderResponse {
            content,
            usage: parsed.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            }),
        })
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies a transport-level failure.
fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout;
    }
    ProviderError::Server {
        status: None,
        message: err.to_string(),
    }
}

/// Classifies a non-success HTTP status.
fn classify_status(status: StatusCode, response: &reqwest::Response) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::Overloaded {
            retry_after_ms: retry_after_hint(response),
        };
    }
    if status.is_server_error() {
        return ProviderError::Server {
            status: Some(status.as_u16()),
            message: format!("provider returned {status}"),
        };
    }
    ProviderError::Client {
        status: status.as_u16(),
        message: format!("provider returned {status}"),
    }
}

/// Reads the retry-after header as milliseconds, when present and numeric.
fn retry_after_hint(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(RETRY_AFTER_HEADER)?;
    let seconds: u64 = value.to_str().ok()?.trim().parse().ok()?;
    seconds.checked_mul(1_000)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
