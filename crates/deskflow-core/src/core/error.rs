// crates/deskflow-core/src/core/error.rs
// ============================================================================
// Module: Error Taxonomy
// Description: Stable error types for tools, providers, gateway, and stores.
// Purpose: Provide the typed failure surface shared across runtime seams.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every runtime seam fails with a typed error from this module. Variants
//! are stable for programmatic handling and carry `kind` labels consumed by
//! the audit path. Provider failures classify into exactly four kinds
//! (timeout, overloaded, server, client); only client errors are
//! non-retryable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::AgentName;
use crate::core::identifiers::RoleName;
use crate::core::identifiers::ToolName;

// ============================================================================
// SECTION: Tool Errors
// ============================================================================

/// Failures raised on the tool execution path.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Authorization` names only the missing requirement, never the roles the
///   caller actually holds.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("unknown tool: {tool}")]
    NotFound {
        /// Requested tool name.
        tool: ToolName,
    },
    /// Arguments failed schema validation.
    #[error("invalid arguments for {tool}: {message}")]
    Validation {
        /// Tool whose schema rejected the arguments.
        tool: ToolName,
        /// Validation failure detail.
        message: String,
    },
    /// Caller lacks every role required by a write/execute tool.
    #[error("caller is not authorized for {tool}: requires one of {required:?}")]
    Authorization {
        /// Tool that was denied.
        tool: ToolName,
        /// Roles of which at least one is required.
        required: Vec<RoleName>,
    },
    /// Handler reported an upstream failure.
    #[error("upstream failure in {tool}: {message}")]
    Upstream {
        /// Tool whose handler failed.
        tool: ToolName,
        /// Upstream failure detail.
        message: String,
    },
    /// Handler exceeded its execution budget.
    #[error("tool {tool} timed out after {timeout_ms}ms")]
    Timeout {
        /// Tool that timed out.
        tool: ToolName,
        /// Budget that was exceeded, in milliseconds.
        timeout_ms: u64,
    },
}

impl ToolError {
    /// Returns a stable kind label for audit and result reporting.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound {
                ..
            } => "not_found",
            Self::Validation {
                ..
            } => "validation_error",
            Self::Authorization {
                ..
            } => "authorization_error",
            Self::Upstream {
                ..
            } => "upstream_error",
            Self::Timeout {
                ..
            } => "timeout",
        }
    }
}

// ============================================================================
// SECTION: Provider Errors
// ============================================================================

/// Classified failure of one model-provider attempt.
///
/// # Invariants
/// - Exactly four kinds; classification decides retry eligibility.
/// - `Client` is never retried.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider call exceeded its time budget.
    #[error("provider timed out")]
    Timeout,
    /// The provider signalled overload (429-equivalent).
    #[error("provider overloaded")]
    Overloaded {
        /// Provider-supplied retry hint in milliseconds, when present.
        retry_after_ms: Option<u64>,
    },
    /// The provider or transport failed (5xx-equivalent).
    #[error("provider server error: {message}")]
    Server {
        /// HTTP status when the failure carried one.
        status: Option<u16>,
        /// Failure detail.
        message: String,
    },
    /// The request was rejected as invalid (4xx-equivalent).
    #[error("provider client error ({status}): {message}")]
    Client {
        /// HTTP status reported by the provider.
        status: u16,
        /// Failure detail.
        message: String,
    },
}

impl ProviderError {
    /// Returns a stable kind label for audit reporting.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "provider_timeout",
            Self::Overloaded {
                ..
            } => "provider_overloaded",
            Self::Server {
                ..
            } => "provider_server_error",
            Self::Client {
                ..
            } => "provider_client_error",
        }
    }

    /// Returns true when another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client { .. })
    }

    /// Returns the provider retry hint in milliseconds, when present.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Overloaded {
                retry_after_ms,
            } => *retry_after_ms,
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Gateway Errors
// ============================================================================

/// Failures surfaced by the model gateway after guardrails and retries.
///
/// # Invariants
/// - Guardrail violations are distinct from provider failures.
/// - `Provider` carries the last classified error, never a swallowed one.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request violated an input guardrail.
    #[error("guardrail violation: {reason}")]
    Guardrail {
        /// Stable violation reason label.
        reason: String,
    },
    /// A structured-output completion failed shape validation.
    #[error("invalid structured output: {0}")]
    InvalidOutput(String),
    /// The provider failed after the retry budget was spent.
    #[error("provider failed after {attempts} attempt(s): {last}")]
    Provider {
        /// Attempts actually made.
        attempts: u32,
        /// Last classified provider error.
        #[source]
        last: ProviderError,
    },
}

impl GatewayError {
    /// Returns a stable kind label for audit reporting.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Guardrail {
                ..
            } => "guardrail_violation",
            Self::InvalidOutput(_) => "invalid_output",
            Self::Provider {
                last, ..
            } => last.kind(),
        }
    }
}

// ============================================================================
// SECTION: Planner / Retrieval / Store Errors
// ============================================================================

/// Planner seam errors.
///
/// Planner strategies degrade malformed model output to an empty plan; this
/// error exists for genuinely unexpected internal failures only.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Planner reported an internal error.
    #[error("planner error: {0}")]
    Internal(String),
}

/// Retrieval backend errors.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Retrieval backend reported an error.
    #[error("retrieval error: {0}")]
    Backend(String),
}

/// Dialogue store errors (best-effort persistence, never fatal).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store reported an error.
    #[error("dialogue store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Orchestrator Errors
// ============================================================================

/// Terminal orchestrator failures surfaced to the entry boundary.
///
/// Tool failures are not orchestrator errors; they are reported inside the
/// response with partial results intact.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The addressed agent is not configured.
    #[error("unknown agent: {agent}")]
    UnknownAgent {
        /// Agent name from the request.
        agent: AgentName,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================
