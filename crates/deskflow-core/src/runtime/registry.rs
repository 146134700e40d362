// crates/deskflow-core/src/runtime/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Immutable mapping from tool names to executable capabilities.
// Purpose: Validate, authorize, and dispatch tool calls at most once.
// Dependencies: jsonschema, tokio, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The registry is built once at startup and treated as immutable
//! thereafter, so concurrent requests share it without locks. Execution
//! follows a fixed order: lookup, schema validation, role check for
//! write/execute tools, then one handler invocation under a bounded timeout.
//! The role check happens **before** the handler runs; a denial has zero
//! side effects. The registry never retries — at-most-once dispatch is the
//! contract write/execute handlers rely on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tokio::time::timeout;

use crate::core::CallerClaims;
use crate::core::ToolCall;
use crate::core::ToolError;
use crate::core::ToolName;
use crate::core::ToolSpec;
use crate::interfaces::ToolHandler;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registration-time errors; execution-time failures are [`ToolError`].
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool already registered: {tool}")]
    Duplicate {
        /// Conflicting tool name.
        tool: ToolName,
    },
    /// The declared argument schema failed to compile.
    #[error("invalid schema for {tool}: {message}")]
    InvalidSchema {
        /// Tool whose schema is invalid.
        tool: ToolName,
        /// Compilation failure detail.
        message: String,
    },
}

// ============================================================================
// SECTION: Registered Tool
// ============================================================================

/// One registered capability with its compiled argument validator.
struct RegisteredTool {
    /// Declared capability record.
    spec: ToolSpec,
    /// Executable handler.
    handler: Arc<dyn ToolHandler>,
    /// Argument validator compiled at registration.
    validator: Validator,
}

// ============================================================================
// SECTION: Tool Registry
// ============================================================================

/// Immutable tool registry shared across concurrent requests.
///
/// # Invariants
/// - Built once at startup; no mutation after construction.
/// - Holds no per-request state; safe for concurrent reads.
pub struct ToolRegistry {
    /// Registered tools keyed by name.
    tools: BTreeMap<ToolName, RegisteredTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registers a tool, compiling its argument schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] for a name collision and
    /// [`RegistryError::InvalidSchema`] when the schema does not compile.
    pub fn register(
        &mut self,
        spec: ToolSpec,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate {
                tool: spec.name,
            });
        }
        let validator = compile_schema(&spec.name, &spec.args_schema)?;
        let name = spec.name.clone();
        self.tools.insert(name, RegisteredTool {
            spec,
            handler,
            validator,
        });
        Ok(())
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns the spec for a registered tool.
    #[must_use]
    pub fn spec(&self, name: &ToolName) -> Option<&ToolSpec> {
        self.tools.get(name).map(|tool| &tool.spec)
    }

    /// Returns the specs of all registered tools in name order.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec.clone()).collect()
    }

    /// Executes one tool call at most once.
    ///
    /// The handler budget is the declared per-tool timeout capped by the
    /// remaining request deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for lookup, validation, authorization, timeout,
    /// or upstream failures. Authorization is checked before dispatch, so a
    /// denial carries zero side effects.
    pub async fn execute(
        &self,
        call: &ToolCall,
        claims: &CallerClaims,
        deadline: Instant,
    ) -> Result<Value, ToolError> {
        let Some(registered) = self.tools.get(&call.tool) else {
            return Err(ToolError::NotFound {
                tool: call.tool.clone(),
            });
        };
        validate_arguments(&registered.spec.name, &registered.validator, &call.arguments)?;
        if registered.spec.side_effect.requires_authorization()
            && !claims.has_any_role(registered.spec.required_roles.iter())
        {
            return Err(ToolError::Authorization {
                tool: registered.spec.name.clone(),
                required: registered.spec.required_roles.clone(),
            });
        }
        let budget = handler_budget(&registered.spec, deadline);
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        if budget.is_zero() {
            return Err(ToolError::Timeout {
                tool: registered.spec.name.clone(),
                timeout_ms: budget_ms,
            });
        }
        match timeout(budget, registered.handler.invoke(&call.arguments, claims)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ToolError::Timeout {
                tool: registered.spec.name.clone(),
                timeout_ms: budget_ms,
            }),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles a tool argument schema at registration time.
fn compile_schema(name: &ToolName, schema: &Value) -> Result<Validator, RegistryError> {
    jsonschema::options().with_draft(Draft::Draft202012).build(schema).map_err(|err| {
        RegistryError::InvalidSchema {
            tool: name.clone(),
            message: err.to_string(),
        }
    })
}

/// Validates arguments against a compiled schema.
fn validate_arguments(
    name: &ToolName,
    validator: &Validator,
    arguments: &Value,
) -> Result<(), ToolError> {
    let messages: Vec<String> =
        validator.iter_errors(arguments).map(|error| error.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Validation {
            tool: name.clone(),
            message: messages.join("; "),
        })
    }
}

/// Returns the handler budget: per-tool timeout capped by the deadline.
fn handler_budget(spec: &ToolSpec, deadline: Instant) -> Duration {
    let remaining = deadline.saturating_duration_since(Instant::now());
    Duration::from_millis(spec.timeout_ms).min(remaining)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::core::RoleName;
    use crate::core::SideEffectClass;

    /// Handler that counts invocations and echoes its arguments.
    struct CountingHandler {
        /// Number of completed invocations.
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolHandler for CountingHandler {
        async fn invoke(
            &self,
            arguments: &Value,
            _claims: &CallerClaims,
        ) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": arguments }))
        }
    }

    /// Handler that never completes within any test budget.
    struct StallingHandler;

    #[async_trait]
    impl ToolHandler for StallingHandler {
        async fn invoke(
            &self,
            _arguments: &Value,
            _claims: &CallerClaims,
        ) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn ticket_spec() -> ToolSpec {
        ToolSpec {
            name: ToolName::new("create_ticket"),
            description: "Creates a ticket in the ticket service".to_string(),
            args_schema: json!({
                "type": "object",
                "properties": { "summary": { "type": "string" } },
                "required": ["summary"],
                "additionalProperties": false
            }),
            side_effect: SideEffectClass::Write,
            required_roles: vec![RoleName::new("ticket_writer")],
            timeout_ms: 5_000,
        }
    }

    fn writer_claims() -> CallerClaims {
        CallerClaims::new("alice", [RoleName::new("ticket_writer")])
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn call(arguments: Value) -> ToolCall {
        ToolCall {
            tool: ToolName::new("create_ticket"),
            arguments,
            side_effect: SideEffectClass::Write,
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(ticket_spec(), CountingHandler::new()).unwrap();
        let err = registry.register(ticket_spec(), CountingHandler::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn invalid_schema_is_rejected_at_registration() {
        let mut registry = ToolRegistry::new();
        let mut spec = ticket_spec();
        spec.args_schema = json!({ "type": 42 });
        let err = registry.register(spec, CountingHandler::new()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute(&call(json!({ "summary": "VPN is down" })), &writer_claims(), far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_validation_error() {
        let mut registry = ToolRegistry::new();
        let handler = CountingHandler::new();
        registry.register(ticket_spec(), handler.clone()).unwrap();
        let err = registry
            .execute(&call(json!({ "priority": 1 })), &writer_claims(), far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_role_never_invokes_the_handler() {
        let mut registry = ToolRegistry::new();
        let handler = CountingHandler::new();
        registry.register(ticket_spec(), handler.clone()).unwrap();
        let claims = CallerClaims::new("bob", [RoleName::new("reader")]);
        let err = registry
            .execute(&call(json!({ "summary": "VPN is down" })), &claims, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Authorization { .. }));
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn authorized_call_reaches_the_handler_once() {
        let mut registry = ToolRegistry::new();
        let handler = CountingHandler::new();
        registry.register(ticket_spec(), handler.clone()).unwrap();
        let payload = registry
            .execute(&call(json!({ "summary": "VPN is down" })), &writer_claims(), far_deadline())
            .await
            .unwrap();
        assert_eq!(payload["echo"]["summary"], "VPN is down");
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn read_class_tool_skips_the_role_gate() {
        let mut registry = ToolRegistry::new();
        let handler = CountingHandler::new();
        let mut spec = ticket_spec();
        spec.name = ToolName::new("lookup_ticket");
        spec.side_effect = SideEffectClass::Read;
        spec.required_roles = Vec::new();
        registry.register(spec, handler.clone()).unwrap();
        let claims = CallerClaims::new("bob", []);
        let call = ToolCall {
            tool: ToolName::new("lookup_ticket"),
            arguments: json!({ "summary": "anything" }),
            side_effect: SideEffectClass::Read,
        };
        registry.execute(&call, &claims, far_deadline()).await.unwrap();
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_handler_times_out_within_its_budget() {
        let mut registry = ToolRegistry::new();
        let mut spec = ticket_spec();
        spec.timeout_ms = 50;
        registry.register(spec, Arc::new(StallingHandler)).unwrap();
        let err = registry
            .execute(&call(json!({ "summary": "VPN is down" })), &writer_claims(), far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn expired_deadline_short_circuits_before_dispatch() {
        let mut registry = ToolRegistry::new();
        let handler = CountingHandler::new();
        registry.register(ticket_spec(), handler.clone()).unwrap();
        let err = registry
            .execute(&call(json!({ "summary": "VPN is down" })), &writer_claims(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert_eq!(handler.call_count(), 0);
    }
}
