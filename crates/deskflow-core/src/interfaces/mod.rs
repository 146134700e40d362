// crates/deskflow-core/src/interfaces/mod.rs
// ============================================================================
// Module: Deskflow Interfaces
// Description: Backend-agnostic interfaces for tools, planning, and storage.
// Purpose: Define the contract surfaces used by the Deskflow runtime.
// Dependencies: async-trait, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Deskflow integrates with external systems without
//! embedding backend-specific details. Implementations must fail closed on
//! missing or invalid data. Concrete providers, vector stores, and token
//! verifiers are external collaborators behind these seams; the in-tree
//! implementations exist for the runtime itself and for tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::core::AuditEvent;
use crate::core::CallerClaims;
use crate::core::Chunk;
use crate::core::Dialogue;
use crate::core::GatewayError;
use crate::core::Plan;
use crate::core::PlanError;
use crate::core::ProviderError;
use crate::core::ProviderRequest;
use crate::core::ProviderResponse;
use crate::core::RetrievalError;
use crate::core::StoreError;
use crate::core::ToolError;
use crate::core::ToolSpec;

// ============================================================================
// SECTION: Tool Handler
// ============================================================================

/// Executable capability behind one registered tool.
///
/// Handlers receive arguments that already passed schema validation and a
/// caller that already passed the side-effect role gate. The registry never
/// retries a handler; idempotency and compensation are the handler's
/// responsibility.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with validated arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Upstream`] when the backing system fails.
    async fn invoke(&self, arguments: &Value, claims: &CallerClaims) -> Result<Value, ToolError>;
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Inputs available to a planner strategy for one request.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    /// Free-text task input.
    pub input: &'a str,
    /// Specifications of every registered tool.
    pub tools: &'a [ToolSpec],
    /// End-to-end request deadline.
    pub deadline: Instant,
}

/// Maps free text to an ordered tool plan, or an empty plan for retrieval.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Produces a plan for the given input.
    ///
    /// Unusable model output degrades to an empty plan rather than an error;
    /// [`PlanError`] is reserved for unexpected internal failures.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the strategy itself fails.
    async fn plan(&self, ctx: PlanContext<'_>) -> Result<Plan, PlanError>;
}

// ============================================================================
// SECTION: Retrieval
// ============================================================================

/// Fetches top-k context chunks for retrieval-only answers.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns up to `top_k` chunks ordered by descending relevance.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] when the backend fails.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>, RetrievalError>;
}

// ============================================================================
// SECTION: Model Provider
// ============================================================================

/// Raw model backend reached through the gateway.
///
/// Backends perform exactly one attempt per call and classify every failure
/// into the four provider error kinds. Retry policy lives in the gateway,
/// never here.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stable backend identifier used for static routing.
    fn name(&self) -> &str;

    /// Performs one completion attempt bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProviderError`] for every failure.
    async fn complete(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Guarded completion surface consumed by the runtime.
///
/// Implementations apply guardrails and retry transient failures under one
/// end-to-end deadline.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Completes the request, retrying transient provider failures.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] after guardrail rejection or retry
    /// exhaustion; the last classified provider error is never swallowed.
    async fn complete(
        &self,
        request: ProviderRequest,
        deadline: Instant,
    ) -> Result<ProviderResponse, GatewayError>;
}

// ============================================================================
// SECTION: Dialogue Store
// ============================================================================

/// Best-effort persistence for completed dialogues.
pub trait DialogueStore: Send + Sync {
    /// Saves one completed dialogue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails; callers treat this as
    /// non-fatal.
    fn save(&self, dialogue: &Dialogue) -> Result<(), StoreError>;

    /// Lists the most recent dialogues, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn list_recent(&self, limit: usize) -> Result<Vec<Dialogue>, StoreError>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Fire-and-forget publisher of structured audit events.
///
/// Recording must never block the request path or alter the caller-visible
/// outcome; sink failures are counted, not propagated.
pub trait AuditSink: Send + Sync {
    /// Records one audit event.
    fn record(&self, event: &AuditEvent);
}
