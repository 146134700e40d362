// crates/deskflow-gateway/src/gateway.rs
// ============================================================================
// Module: Model Gateway
// Description: Guarded, retrying completion surface over one chat backend.
// Purpose: Classify failures and retry transients under one deadline.
// Dependencies: deskflow-core, tokio
// ============================================================================

//! ## Overview
//! The gateway wraps a statically selected backend with guardrails and the
//! retry loop. Client errors surface immediately and are never retried; the
//! other three failure kinds retry up to the configured attempt budget with
//! full-jitter backoff, a provider retry-after hint overriding the computed
//! delay for that attempt. All attempts share the request's end-to-end
//! deadline: exceeding it mid-retry aborts immediately as a timeout
//! regardless of remaining attempts. After exhaustion the last classified
//! error is returned typed, never swallowed. Retries apply strictly to the
//! single provider call — a failed plan is never replayed here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deskflow_core::GatewayError;
use deskflow_core::OutputFormat;
use deskflow_core::ProviderError;
use deskflow_core::ProviderRequest;
use deskflow_core::ProviderResponse;
use deskflow_core::interfaces::ChatBackend;
use deskflow_core::interfaces::ChatCompleter;
use serde_json::Value;
use tokio::time::Instant;
use tokio::time::sleep;

use crate::backoff::RetryPolicy;
use crate::guardrails::Guardrails;

// ============================================================================
// SECTION: Backend Router
// ============================================================================

/// Static backend router keyed by configuration name.
///
/// # Invariants
/// - Built once at startup; no dynamic routing.
#[derive(Default)]
pub struct BackendRouter {
    /// Registered backends keyed by name.
    backends: BTreeMap<String, Arc<dyn ChatBackend>>,
}

impl BackendRouter {
    /// Creates an empty router.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Registers a backend under its own name.
    pub fn register(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Selects a backend by static configuration key.
    #[must_use]
    pub fn select(&self, key: &str) -> Option<Arc<dyn ChatBackend>> {
        self.backends.get(key).cloned()
    }
}

// ============================================================================
// SECTION: Model Gateway
// ============================================================================

/// Default per-attempt timeout in milliseconds.
const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 10_000;

/// Guarded, retrying completion surface over one backend.
pub struct ModelGateway {
    /// Statically selected backend.
    backend: Arc<dyn ChatBackend>,
    /// Input guardrails applied before the first attempt.
    guardrails: Guardrails,
    /// Retry policy for transient failures.
    retry: RetryPolicy,
    /// Budget for one provider attempt.
    attempt_timeout: Duration,
}

impl ModelGateway {
    /// Creates a gateway over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, guardrails: Guardrails, retry: RetryPolicy) -> Self {
        Self {
            backend,
            guardrails,
            retry,
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the name of the routed backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Runs the classified retry loop for one guarded request.
    async fn complete_with_retries(
        &self,
        request: &ProviderRequest,
        deadline: Instant,
    ) -> Result<ProviderResponse, GatewayError> {
        let mut attempts = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GatewayError::Provider {
                    attempts,
                    last: ProviderError::Timeout,
                });
            }
            attempts += 1;
            let budget = self.attempt_timeout.min(remaining);
            let err = match self.backend.complete(request, budget).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if !err.is_retryable() || attempts >= self.retry.max_attempts {
                return Err(GatewayError::Provider {
                    attempts,
                    last: err,
                });
            }
            let delay = self.retry.delay_for(attempts - 1, err.retry_after_ms());
            if Instant::now() + delay >= deadline {
                // The deadline would pass mid-backoff; abort as a timeout.
                return Err(GatewayError::Provider {
                    attempts,
                    last: ProviderError::Timeout,
                });
            }
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChatCompleter for ModelGateway {
    async fn complete(
        &self,
        request: ProviderRequest,
        deadline: Instant,
    ) -> Result<ProviderResponse, GatewayError> {
        let mut request = request;
        self.guardrails.apply(&mut request)?;
        let response = self.complete_with_retries(&request, deadline).await?;
        if request.format == OutputFormat::Json {
            validate_json_output(&response.content)?;
        }
        Ok(response)
    }
}

// ============================================================================
// SECTION: Structured Output
// ============================================================================

/// Validates that a structured completion parses as one JSON value.
fn validate_json_output(content: &str) -> Result<(), GatewayError> {
    serde_json::from_str::<Value>(content)
        .map(|_| ())
        .map_err(|err| GatewayError::InvalidOutput(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use super::*;

    #[test]
    fn structured_output_must_parse_as_json() {
        assert!(validate_json_output("{\"calls\":[]}").is_ok());
        assert!(validate_json_output("not json").is_err());
    }

    #[test]
    fn router_selects_by_exact_key() {
        let router = BackendRouter::new();
        assert!(router.select("missing").is_none());
    }
}
