// crates/deskflow-core/src/core/audit.rs
// ============================================================================
// Module: Audit Events
// Description: Structured audit event payloads for request handling.
// Purpose: Emit digest-only audit records without hard sink dependencies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the audit event payload published for every
//! significant action: one event per attempted tool call (including
//! authorization denials) plus one summary event per request. Payloads carry
//! canonical-JSON digests, never raw arguments or results, so deployments
//! can route events to durable archival without redaction passes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::ToolName;
use crate::core::identifiers::TraceId;
use crate::core::time::now_ms;
use crate::core::tool::SideEffectClass;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome classification recorded on every audit event.
///
/// # Invariants
/// - Variants are stable wire labels consumed by archival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    /// Authorization passed and the action ran.
    Allow,
    /// Authorization failed; the action never ran.
    Deny,
    /// The action ran and failed.
    Error,
    /// Terminal request outcome was produced.
    Ok,
}

impl AuditDecision {
    /// Returns a stable label for this decision.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Error => "error",
            Self::Ok => "ok",
        }
    }
}

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// One append-only audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event identifier (`tool_call` or `agent_run`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Server-issued trace identifier for the request.
    pub trace_id: TraceId,
    /// Caller subject that initiated the request.
    pub actor: String,
    /// Agent profile handling the request.
    pub agent: AgentName,
    /// Action label (tool name for tool events, `run` for summaries).
    pub action: String,
    /// Side-effect class for tool events.
    pub side_effect: Option<SideEffectClass>,
    /// Canonical-JSON digest of the tool arguments, when applicable.
    pub args_digest: Option<HashDigest>,
    /// Canonical-JSON digest of the tool result, when applicable.
    pub result_digest: Option<HashDigest>,
    /// Decision classification.
    pub decision: AuditDecision,
    /// Normalized failure or denial reason label.
    pub reason: Option<String>,
    /// Tools that executed successfully (summary events only).
    pub used_tools: Vec<ToolName>,
}

/// Inputs required to construct a tool-call audit event.
pub struct ToolAuditParams {
    /// Server-issued trace identifier.
    pub trace_id: TraceId,
    /// Caller subject.
    pub actor: String,
    /// Agent profile handling the request.
    pub agent: AgentName,
    /// Tool that was attempted.
    pub tool: ToolName,
    /// Side-effect class of the tool.
    pub side_effect: SideEffectClass,
    /// Canonical-JSON digest of the arguments.
    pub args_digest: Option<HashDigest>,
    /// Canonical-JSON digest of the result, when one exists.
    pub result_digest: Option<HashDigest>,
    /// Decision classification.
    pub decision: AuditDecision,
    /// Normalized failure or denial reason label.
    pub reason: Option<String>,
}

/// Inputs required to construct a request summary audit event.
pub struct RunAuditParams {
    /// Server-issued trace identifier.
    pub trace_id: TraceId,
    /// Caller subject.
    pub actor: String,
    /// Agent profile handling the request.
    pub agent: AgentName,
    /// Decision classification for the terminal outcome.
    pub decision: AuditDecision,
    /// Normalized failure reason label, when the outcome degraded.
    pub reason: Option<String>,
    /// Tools that executed successfully, in execution order.
    pub used_tools: Vec<ToolName>,
}

impl AuditEvent {
    /// Creates a tool-call audit event with a consistent timestamp.
    #[must_use]
    pub fn tool_call(params: ToolAuditParams) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: now_ms(),
            trace_id: params.trace_id,
            actor: params.actor,
            agent: params.agent,
            action: params.tool.to_string(),
            side_effect: Some(params.side_effect),
            args_digest: params.args_digest,
            result_digest: params.result_digest,
            decision: params.decision,
            reason: params.reason,
            used_tools: Vec::new(),
        }
    }

    /// Creates a request summary audit event with a consistent timestamp.
    #[must_use]
    pub fn run_summary(params: RunAuditParams) -> Self {
        Self {
            event: "agent_run",
            timestamp_ms: now_ms(),
            trace_id: params.trace_id,
            actor: params.actor,
            agent: params.agent,
            action: "run".to_string(),
            side_effect: None,
            args_digest: None,
            result_digest: None,
            decision: params.decision,
            reason: params.reason,
            used_tools: params.used_tools,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use super::*;

    #[test]
    fn tool_event_records_side_effect_and_decision() {
        let event = AuditEvent::tool_call(ToolAuditParams {
            trace_id: TraceId::new("df-0-1"),
            actor: "alice".to_string(),
            agent: AgentName::new("helpdesk"),
            tool: ToolName::new("create_ticket"),
            side_effect: SideEffectClass::Write,
            args_digest: None,
            result_digest: None,
            decision: AuditDecision::Deny,
            reason: Some("authorization_error".to_string()),
        });
        assert_eq!(event.event, "tool_call");
        assert_eq!(event.side_effect, Some(SideEffectClass::Write));
        assert_eq!(event.decision, AuditDecision::Deny);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["side_effect"], "write");
    }

    #[test]
    fn summary_event_carries_used_tools() {
        let event = AuditEvent::run_summary(RunAuditParams {
            trace_id: TraceId::new("df-0-2"),
            actor: "alice".to_string(),
            agent: AgentName::new("helpdesk"),
            decision: AuditDecision::Ok,
            reason: None,
            used_tools: vec![ToolName::new("create_ticket")],
        });
        assert_eq!(event.action, "run");
        assert_eq!(event.used_tools.len(), 1);
    }
}
