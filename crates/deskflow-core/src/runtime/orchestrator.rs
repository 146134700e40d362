// crates/deskflow-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Request Orchestrator
// Description: Sequences planning, tool execution, retrieval, and audit.
// Purpose: Turn one agent request into exactly one terminal outcome.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The orchestrator owns the per-request pipeline: agent validation,
//! planning, sequential tool execution (short-circuiting on first failure),
//! retrieval fallback with answer composition, best-effort dialogue
//! persistence, and audit emission. Every request yields at least one audit
//! event regardless of outcome, and one event per attempted tool call
//! (including authorization denials). Persistence and audit are isolated
//! side channels: their failure never alters the already-computed response.
//!
//! All collaborators are immutable after construction and shared via `Arc`,
//! so independent requests run fully in parallel; calls within one plan run
//! sequentially to preserve ordering and avoid compounding side effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::AgentName;
use crate::core::AgentRequest;
use crate::core::AgentResponse;
use crate::core::AuditDecision;
use crate::core::AuditEvent;
use crate::core::ChatMessage;
use crate::core::Chunk;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::Dialogue;
use crate::core::GenerationParams;
use crate::core::OrchestratorError;
use crate::core::OutputFormat;
use crate::core::Plan;
use crate::core::ProviderRequest;
use crate::core::RunAuditParams;
use crate::core::ToolAuditParams;
use crate::core::ToolError;
use crate::core::ToolName;
use crate::core::ToolOutcome;
use crate::core::ToolResult;
use crate::core::ToolSpec;
use crate::core::hashing::hash_canonical_json;
use crate::core::now_ms;
use crate::interfaces::AuditSink;
use crate::interfaces::ChatCompleter;
use crate::interfaces::DialogueStore;
use crate::interfaces::PlanContext;
use crate::interfaces::Planner;
use crate::interfaces::Retriever;
use crate::runtime::registry::ToolRegistry;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Orchestrator tuning values resolved from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of chunks requested on the retrieval path.
    pub retrieval_top_k: usize,
    /// Model identifier used for answer composition.
    pub answer_model: String,
    /// Generation parameters for answer composition.
    pub compose_params: GenerationParams,
    /// Deterministic answer returned when retrieval finds nothing.
    pub no_match_answer: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 4,
            answer_model: "default".to_string(),
            compose_params: GenerationParams::default(),
            no_match_answer: "I could not find anything relevant to that request.".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Collaborators wired into the orchestrator at startup.
pub struct OrchestratorParts {
    /// Configured agent names accepted at the entry boundary.
    pub agents: BTreeSet<AgentName>,
    /// Immutable tool registry.
    pub registry: Arc<ToolRegistry>,
    /// Planner strategy.
    pub planner: Arc<dyn Planner>,
    /// Retrieval backend.
    pub retriever: Arc<dyn Retriever>,
    /// Guarded model completion surface.
    pub completer: Arc<dyn ChatCompleter>,
    /// Best-effort dialogue store.
    pub store: Arc<dyn DialogueStore>,
    /// Fire-and-forget audit sink.
    pub audit: Arc<dyn AuditSink>,
}

/// Per-request pipeline over immutable, shared collaborators.
///
/// # Invariants
/// - Holds no per-request mutable state; safe for concurrent use.
/// - Every handled request emits at least one audit event.
pub struct Orchestrator {
    /// Configured agent names.
    agents: BTreeSet<AgentName>,
    /// Immutable tool registry.
    registry: Arc<ToolRegistry>,
    /// Tool specs snapshot taken at construction.
    tool_specs: Vec<ToolSpec>,
    /// Planner strategy.
    planner: Arc<dyn Planner>,
    /// Retrieval backend.
    retriever: Arc<dyn Retriever>,
    /// Guarded model completion surface.
    completer: Arc<dyn ChatCompleter>,
    /// Best-effort dialogue store.
    store: Arc<dyn DialogueStore>,
    /// Fire-and-forget audit sink.
    audit: Arc<dyn AuditSink>,
    /// Tuning values.
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator from its wired collaborators.
    #[must_use]
    pub fn new(parts: OrchestratorParts, config: OrchestratorConfig) -> Self {
        let tool_specs = parts.registry.specs();
        Self {
            agents: parts.agents,
            registry: parts.registry,
            tool_specs,
            planner: parts.planner,
            retriever: parts.retriever,
            completer: parts.completer,
            store: parts.store,
            audit: parts.audit,
            config,
        }
    }

    /// Returns true when the agent name is configured.
    #[must_use]
    pub fn knows_agent(&self, agent: &AgentName) -> bool {
        self.agents.contains(agent)
    }
}

// ============================================================================
// SECTION: Request Handling
// ============================================================================

/// Accumulated outcome of the tool-execution phase.
struct ToolPhase {
    /// Per-call results in execution order.
    results: Vec<ToolResult>,
    /// Tools whose handler completed successfully.
    used_tools: Vec<ToolName>,
    /// Kind label of the short-circuiting failure, when one occurred.
    failure_kind: Option<String>,
}

impl Orchestrator {
    /// Handles one agent request to exactly one terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownAgent`] for an unconfigured agent
    /// name (fail closed). Tool failures are reported inside the response
    /// with partial results intact, never as an orchestrator error.
    pub async fn handle(&self, request: AgentRequest) -> Result<AgentResponse, OrchestratorError> {
        if !self.agents.contains(&request.agent) {
            self.audit.record(&AuditEvent::run_summary(RunAuditParams {
                trace_id: request.trace_id.clone(),
                actor: request.claims.subject.clone(),
                agent: request.agent.clone(),
                decision: AuditDecision::Error,
                reason: Some("not_found".to_string()),
                used_tools: Vec::new(),
            }));
            return Err(OrchestratorError::UnknownAgent {
                agent: request.agent,
            });
        }

        let plan = self.plan(&request).await;
        let (output, used_tools, tool_results, degrade_reason) = if plan.is_empty() {
            let (answer, reason) = self.answer_from_retrieval(&request).await;
            (answer, Vec::new(), Vec::new(), reason)
        } else {
            let phase = self.execute_plan(&request, &plan).await;
            let answer = compose_tool_answer(&phase.results);
            (answer, phase.used_tools, phase.results, phase.failure_kind)
        };

        let mut summary_reason = degrade_reason;
        let dialogue = Dialogue {
            agent: request.agent.clone(),
            query: request.input.clone(),
            answer: output.clone(),
            used_tools: used_tools.clone(),
            trace_id: request.trace_id.clone(),
            created_ms: now_ms(),
        };
        if self.store.save(&dialogue).is_err() && summary_reason.is_none() {
            summary_reason = Some("persistence_error".to_string());
        }

        self.audit.record(&AuditEvent::run_summary(RunAuditParams {
            trace_id: request.trace_id.clone(),
            actor: request.claims.subject.clone(),
            agent: request.agent.clone(),
            decision: AuditDecision::Ok,
            reason: summary_reason,
            used_tools: used_tools.clone(),
        }));

        Ok(AgentResponse {
            output,
            reasoning_trace_id: request.trace_id,
            used_tools,
            tool_results,
        })
    }

    /// Runs the planner; planner-internal failures degrade to an empty plan.
    async fn plan(&self, request: &AgentRequest) -> Plan {
        let ctx = PlanContext {
            input: &request.input,
            tools: &self.tool_specs,
            deadline: request.deadline,
        };
        self.planner.plan(ctx).await.unwrap_or_else(|_| Plan::empty())
    }

    /// Executes plan calls sequentially, short-circuiting on first failure.
    async fn execute_plan(&self, request: &AgentRequest, plan: &Plan) -> ToolPhase {
        let mut phase = ToolPhase {
            results: Vec::with_capacity(plan.calls.len()),
            used_tools: Vec::new(),
            failure_kind: None,
        };
        for call in &plan.calls {
            let side_effect = self
                .registry
                .spec(&call.tool)
                .map_or(call.side_effect, |spec| spec.side_effect);
            let args_digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &call.arguments).ok();
            match self.registry.execute(call, &request.claims, request.deadline).await {
                Ok(payload) => {
                    let result_digest =
                        hash_canonical_json(DEFAULT_HASH_ALGORITHM, &payload).ok();
                    self.audit.record(&AuditEvent::tool_call(ToolAuditParams {
                        trace_id: request.trace_id.clone(),
                        actor: request.claims.subject.clone(),
                        agent: request.agent.clone(),
                        tool: call.tool.clone(),
                        side_effect,
                        args_digest,
                        result_digest,
                        decision: AuditDecision::Allow,
                        reason: None,
                    }));
                    phase.used_tools.push(call.tool.clone());
                    phase.results.push(ToolResult {
                        tool: call.tool.clone(),
                        outcome: ToolOutcome::Success {
                            payload,
                        },
                    });
                }
                Err(err) => {
                    let decision = match &err {
                        ToolError::Authorization {
                            ..
                        } => AuditDecision::Deny,
                        _ => AuditDecision::Error,
                    };
                    self.audit.record(&AuditEvent::tool_call(ToolAuditParams {
                        trace_id: request.trace_id.clone(),
                        actor: request.claims.subject.clone(),
                        agent: request.agent.clone(),
                        tool: call.tool.clone(),
                        side_effect,
                        args_digest,
                        result_digest: None,
                        decision,
                        reason: Some(err.kind().to_string()),
                    }));
                    phase.failure_kind = Some(err.kind().to_string());
                    phase.results.push(ToolResult {
                        tool: call.tool.clone(),
                        outcome: ToolOutcome::Failure {
                            kind: err.kind().to_string(),
                            message: err.to_string(),
                        },
                    });
                    break;
                }
            }
        }
        phase
    }

    /// Answers from retrieval, composing via the gateway when possible.
    ///
    /// Returns the answer plus an optional degrade-reason label for the
    /// summary event. Gateway exhaustion degrades to quoting the retrieved
    /// chunks directly; a tool result is never fabricated.
    async fn answer_from_retrieval(&self, request: &AgentRequest) -> (String, Option<String>) {
        let chunks = match self
            .retriever
            .search(&request.input, self.config.retrieval_top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(_) => {
                return (self.config.no_match_answer.clone(), Some("retrieval_error".to_string()));
            }
        };
        if chunks.is_empty() {
            return (self.config.no_match_answer.clone(), None);
        }
        match self.completer.complete(compose_request(&self.config, request, &chunks), request.deadline).await
        {
            Ok(response) => (response.content, None),
            Err(err) => (quote_chunks(&chunks), Some(err.kind().to_string())),
        }
    }
}

// ============================================================================
// SECTION: Composition Helpers
// ============================================================================

/// Builds the retrieval-grounded composition request.
fn compose_request(
    config: &OrchestratorConfig,
    request: &AgentRequest,
    chunks: &[Chunk],
) -> ProviderRequest {
    let mut context = String::new();
    for chunk in chunks {
        context.push_str(&format!("[{}] {}\n", chunk.source, chunk.text));
    }
    let system = format!(
        "Answer the user's question using only the context below. \
         Cite the bracketed source of anything you use.\n\nContext:\n{context}"
    );
    ProviderRequest {
        model: config.answer_model.clone(),
        messages: vec![ChatMessage::system(system), ChatMessage::user(&request.input)],
        params: config.compose_params.clone(),
        format: OutputFormat::Text,
    }
}

/// Deterministic degraded answer quoting retrieved chunks.
fn quote_chunks(chunks: &[Chunk]) -> String {
    let mut answer = String::from("Most relevant references:\n");
    for chunk in chunks {
        answer.push_str(&format!("- [{}] {}\n", chunk.source, chunk.text));
    }
    answer
}

/// Deterministic answer composed from tool results in execution order.
fn compose_tool_answer(results: &[ToolResult]) -> String {
    let mut lines = Vec::with_capacity(results.len());
    for result in results {
        match &result.outcome {
            ToolOutcome::Success {
                payload,
            } => lines.push(format!("{}: completed ({payload})", result.tool)),
            ToolOutcome::Failure {
                message, ..
            } => lines.push(format!("{}: {message}", result.tool)),
        }
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use serde_json::json;

    use super::*;

    #[test]
    fn tool_answer_reports_each_step_in_order() {
        let results = vec![
            ToolResult {
                tool: ToolName::new("lookup_ticket"),
                outcome: ToolOutcome::Success {
                    payload: json!({ "id": 7 }),
                },
            },
            ToolResult {
                tool: ToolName::new("create_ticket"),
                outcome: ToolOutcome::Failure {
                    kind: "authorization_error".to_string(),
                    message: "caller is not authorized".to_string(),
                },
            },
        ];
        let answer = compose_tool_answer(&results);
        let first = answer.find("lookup_ticket").unwrap();
        let second = answer.find("create_ticket").unwrap();
        assert!(first < second);
        assert!(answer.contains("not authorized"));
    }

    #[test]
    fn quoted_chunks_reference_their_sources() {
        let chunks = vec![Chunk {
            source: "kb/password-reset".to_string(),
            text: "Use the portal".to_string(),
            score: 1.0,
        }];
        let answer = quote_chunks(&chunks);
        assert!(answer.contains("kb/password-reset"));
    }
}
