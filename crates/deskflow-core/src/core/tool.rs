// crates/deskflow-core/src/core/tool.rs
// ============================================================================
// Module: Tool Model
// Description: Tool specifications, planned calls, results, and plans.
// Purpose: Provide the canonical types flowing between planner and registry.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These types describe everything the runtime knows about a tool: its
//! declared capability record (schema, side-effect class, required roles),
//! the calls a planner produces, and the results the registry reports.
//! Ordering matters: a [`Plan`] is an ordered sequence and results are
//! reported in call order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RoleName;
use crate::core::identifiers::ToolName;

// ============================================================================
// SECTION: Side-Effect Class
// ============================================================================

/// Side-effect classification declared per tool.
///
/// # Invariants
/// - Variants are stable wire labels consumed by audit archival.
/// - Write and execute gate a role check before handler dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    /// Read-only lookup; no authorization gate.
    Read,
    /// Mutates external state; requires a role check before dispatch.
    Write,
    /// Triggers an external action; requires a role check before dispatch.
    Execute,
}

impl SideEffectClass {
    /// Returns a stable label for this class.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        }
    }

    /// Returns true when this class requires an authorization check.
    #[must_use]
    pub const fn requires_authorization(&self) -> bool {
        matches!(self, Self::Write | Self::Execute)
    }
}

// ============================================================================
// SECTION: Tool Specification
// ============================================================================

/// Declared capability record for one registered tool.
///
/// # Invariants
/// - `args_schema` is a JSON Schema document compiled once at registration.
/// - `required_roles` is consulted only for write/execute classes.
/// - `timeout_ms` bounds one handler invocation; the registry never retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, unique within the registry.
    pub name: ToolName,
    /// Human-readable description surfaced to the model planner.
    pub description: String,
    /// JSON Schema for the tool arguments.
    pub args_schema: Value,
    /// Side-effect classification.
    pub side_effect: SideEffectClass,
    /// Roles of which the caller must hold at least one (write/execute only).
    pub required_roles: Vec<RoleName>,
    /// Handler timeout budget in milliseconds.
    pub timeout_ms: u64,
}

// ============================================================================
// SECTION: Tool Call and Result
// ============================================================================

/// One planned tool invocation.
///
/// # Invariants
/// - `side_effect` mirrors the registered spec at plan time; the registry
///   treats its own spec as authoritative at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool to invoke.
    pub tool: ToolName,
    /// Arguments to validate and pass to the handler.
    pub arguments: Value,
    /// Side-effect classification recorded at plan time.
    pub side_effect: SideEffectClass,
}

/// Outcome of one attempted tool invocation.
///
/// # Invariants
/// - A denied authorization is a `Failure`, never a fabricated `Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ToolOutcome {
    /// Handler completed and returned a payload.
    Success {
        /// Handler payload.
        payload: Value,
    },
    /// Lookup, validation, authorization, or handler execution failed.
    Failure {
        /// Stable error kind label.
        kind: String,
        /// Human-readable failure message.
        message: String,
    },
}

impl ToolOutcome {
    /// Returns true for successful outcomes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Result reported for one attempted [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was attempted.
    pub tool: ToolName,
    /// Outcome of the attempt.
    pub outcome: ToolOutcome,
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Ordered sequence of tool calls produced by a planner.
///
/// # Invariants
/// - Call order is execution order; an empty plan means retrieval-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Calls to execute sequentially.
    pub calls: Vec<ToolCall>,
}

impl Plan {
    /// Creates an empty plan (retrieval-only).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            calls: Vec::new(),
        }
    }

    /// Creates a plan from an ordered call list.
    #[must_use]
    pub fn new(calls: Vec<ToolCall>) -> Self {
        Self {
            calls,
        }
    }

    /// Returns true when the plan contains no calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_class_skips_authorization() {
        assert!(!SideEffectClass::Read.requires_authorization());
        assert!(SideEffectClass::Write.requires_authorization());
        assert!(SideEffectClass::Execute.requires_authorization());
    }

    #[test]
    fn side_effect_labels_are_snake_case() {
        assert_eq!(SideEffectClass::Execute.label(), "execute");
    }

    #[test]
    fn empty_plan_means_retrieval_only() {
        assert!(Plan::empty().is_empty());
    }
}
