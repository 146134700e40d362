// crates/deskflow-core/src/core/request.rs
// ============================================================================
// Module: Agent Request Model
// Description: Inbound request, terminal response, dialogue, and chunk types.
// Purpose: Provide the per-request value types flowing through the orchestrator.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! An [`AgentRequest`] is immutable, created once per call at the entry
//! boundary, and scoped to one orchestrator pass. The request carries the
//! server-issued trace identifier and the end-to-end deadline that bounds
//! every downstream call. The terminal [`AgentResponse`] reports the
//! composed answer, the tools used, and per-call results in execution order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::core::claims::CallerClaims;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::ToolName;
use crate::core::identifiers::TraceId;
use crate::core::tool::ToolResult;

// ============================================================================
// SECTION: Agent Request
// ============================================================================

/// One inbound task request, scoped to a single orchestrator pass.
///
/// # Invariants
/// - Immutable after construction at the entry boundary.
/// - `deadline` bounds every downstream call for this request.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Agent profile addressed by the caller.
    pub agent: AgentName,
    /// Free-text task input.
    pub input: String,
    /// Verified caller identity and roles.
    pub claims: CallerClaims,
    /// Opaque request metadata from the entry boundary.
    pub metadata: Value,
    /// Server-issued trace identifier.
    pub trace_id: TraceId,
    /// End-to-end deadline for this request.
    pub deadline: Instant,
}

// ============================================================================
// SECTION: Agent Response
// ============================================================================

/// Terminal outcome of one orchestrated request.
///
/// # Invariants
/// - `tool_results` preserve plan order and stop at the first failure.
/// - `used_tools` lists only tools whose handler ran successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Composed answer text.
    pub output: String,
    /// Trace identifier echoed for correlation.
    pub reasoning_trace_id: TraceId,
    /// Tools that executed successfully, in execution order.
    pub used_tools: Vec<ToolName>,
    /// Per-call results for every attempted tool call.
    pub tool_results: Vec<ToolResult>,
}

// ============================================================================
// SECTION: Dialogue
// ============================================================================

/// One completed request persisted best-effort for later inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialogue {
    /// Agent that handled the request.
    pub agent: AgentName,
    /// Original free-text input.
    pub query: String,
    /// Composed answer text.
    pub answer: String,
    /// Tools that executed successfully.
    pub used_tools: Vec<ToolName>,
    /// Trace identifier of the request.
    pub trace_id: TraceId,
    /// Creation time in epoch milliseconds.
    pub created_ms: u128,
}

// ============================================================================
// SECTION: Retrieval Chunk
// ============================================================================

/// One scored context chunk returned by the retrieval backend.
///
/// # Invariants
/// - Chunks are ordered score-descending by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document identifier.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Relevance score (higher is more relevant).
    pub score: f64,
}
