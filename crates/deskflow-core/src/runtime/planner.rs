// crates/deskflow-core/src/runtime/planner.rs
// ============================================================================
// Module: Planner Strategies
// Description: Keyword and model-assisted planning behind one interface.
// Purpose: Map free text to an ordered tool plan, or empty for retrieval.
// Dependencies: jsonschema, serde, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Two interchangeable strategies implement [`Planner`]: a deterministic
//! keyword matcher and a model-assisted planner that asks the gateway for a
//! JSON-constrained call list. The tiered planner preserves the exact
//! tie-break order: keyword first (cheap, deterministic), model-assisted
//! only when no keyword matched. Unusable model output — malformed JSON,
//! unknown tools, schema violations — always degrades to an empty plan and
//! never propagates as an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::Draft;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ChatMessage;
use crate::core::GenerationParams;
use crate::core::OutputFormat;
use crate::core::Plan;
use crate::core::PlanError;
use crate::core::ProviderRequest;
use crate::core::ToolCall;
use crate::core::ToolName;
use crate::core::ToolSpec;
use crate::interfaces::ChatCompleter;
use crate::interfaces::PlanContext;
use crate::interfaces::Planner;

// ============================================================================
// SECTION: Keyword Strategy
// ============================================================================

/// One configured trigger phrase mapping to a templated tool call.
///
/// # Invariants
/// - `trigger` is matched ASCII-case-insensitively as a substring.
/// - String values in `arguments` may contain `{input}` (full input text)
///   and `{rest}` (text after the trigger) placeholders.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    /// Trigger phrase to match against the input.
    pub trigger: String,
    /// Tool invoked when the trigger matches.
    pub tool: ToolName,
    /// Argument template with placeholder substitution.
    pub arguments: Value,
}

/// Deterministic first-match keyword planner.
#[derive(Debug, Clone, Default)]
pub struct KeywordPlanner {
    /// Rules evaluated in configuration order.
    rules: Vec<KeywordRule>,
}

impl KeywordPlanner {
    /// Creates a planner from configured rules.
    #[must_use]
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self {
            rules,
        }
    }

    /// Produces a plan synchronously; first matching rule wins.
    ///
    /// A rule naming an unregistered tool is skipped (fail closed) so a
    /// configuration drift never produces an unexecutable call.
    #[must_use]
    pub fn plan_keywords(&self, input: &str, tools: &[ToolSpec]) -> Plan {
        let haystack = input.to_ascii_lowercase();
        for rule in &self.rules {
            let needle = rule.trigger.to_ascii_lowercase();
            if needle.is_empty() {
                continue;
            }
            let Some(position) = haystack.find(&needle) else {
                continue;
            };
            let Some(spec) = tools.iter().find(|spec| spec.name == rule.tool) else {
                continue;
            };
            let rest = input[position + needle.len()..].trim_start_matches([':', ' ', '\t']);
            let arguments = substitute(&rule.arguments, input, rest);
            return Plan::new(vec![ToolCall {
                tool: spec.name.clone(),
                arguments,
                side_effect: spec.side_effect,
            }]);
        }
        Plan::empty()
    }
}

#[async_trait]
impl Planner for KeywordPlanner {
    async fn plan(&self, ctx: PlanContext<'_>) -> Result<Plan, PlanError> {
        Ok(self.plan_keywords(ctx.input, ctx.tools))
    }
}

/// Substitutes `{input}` and `{rest}` placeholders in template strings.
fn substitute(template: &Value, input: &str, rest: &str) -> Value {
    match template {
        Value::String(text) => {
            Value::String(text.replace("{input}", input).replace("{rest}", rest))
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| substitute(item, input, rest)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter().map(|(key, value)| (key.clone(), substitute(value, input, rest))).collect(),
        ),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Model-Assisted Strategy
// ============================================================================

/// Expected shape of the model planning completion.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlannedCalls {
    /// Proposed calls in execution order.
    calls: Vec<PlannedCall>,
}

/// One proposed call in the model completion.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlannedCall {
    /// Proposed tool name.
    tool: String,
    /// Proposed arguments.
    args: Value,
}

/// Model-assisted planner constrained to a fixed JSON output schema.
pub struct ModelPlanner {
    /// Gateway surface used for the planning completion.
    completer: Arc<dyn ChatCompleter>,
    /// Provider model identifier.
    model: String,
    /// Generation parameters for planning calls.
    params: GenerationParams,
}

impl ModelPlanner {
    /// Creates a planner backed by the given completion surface.
    #[must_use]
    pub fn new(completer: Arc<dyn ChatCompleter>, model: impl Into<String>) -> Self {
        Self {
            completer,
            model: model.into(),
            params: GenerationParams::default(),
        }
    }

    /// Overrides the generation parameters for planning calls.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Builds the JSON-constrained planning prompt for the tool catalog.
    fn planning_request(&self, ctx: &PlanContext<'_>) -> ProviderRequest {
        let mut catalog = String::new();
        for spec in ctx.tools {
            catalog.push_str(&format!(
                "- {}: {} (arguments schema: {})\n",
                spec.name, spec.description, spec.args_schema
            ));
        }
        let system = format!(
            "You select tools for a task. Available tools:\n{catalog}\
             Respond with exactly one JSON object of the form \
             {{\"calls\":[{{\"tool\":\"<name>\",\"args\":{{...}}}}]}}. \
             Use {{\"calls\":[]}} when no tool applies. No other text."
        );
        ProviderRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(ctx.input)],
            params: self.params.clone(),
            format: OutputFormat::Json,
        }
    }

    /// Parses and validates a completion into a plan.
    ///
    /// Any malformed JSON, unknown tool, or schema violation renders the
    /// whole completion unusable and yields an empty plan.
    fn parse_completion(content: &str, tools: &[ToolSpec]) -> Plan {
        let Ok(parsed) = serde_json::from_str::<PlannedCalls>(content) else {
            return Plan::empty();
        };
        let mut calls = Vec::with_capacity(parsed.calls.len());
        for proposed in parsed.calls {
            let name = ToolName::new(proposed.tool);
            let Some(spec) = tools.iter().find(|spec| spec.name == name) else {
                return Plan::empty();
            };
            if !arguments_match_schema(&spec.args_schema, &proposed.args) {
                return Plan::empty();
            }
            calls.push(ToolCall {
                tool: spec.name.clone(),
                arguments: proposed.args,
                side_effect: spec.side_effect,
            });
        }
        Plan::new(calls)
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    async fn plan(&self, ctx: PlanContext<'_>) -> Result<Plan, PlanError> {
        let request = self.planning_request(&ctx);
        match self.completer.complete(request, ctx.deadline).await {
            Ok(response) => Ok(Self::parse_completion(&response.content, ctx.tools)),
            // Gateway exhaustion on the planning call is "no usable plan",
            // letting the orchestrator degrade to retrieval.
            Err(_) => Ok(Plan::empty()),
        }
    }
}

/// Validates proposed arguments against a declared tool schema.
fn arguments_match_schema(schema: &Value, arguments: &Value) -> bool {
    let Ok(validator) = jsonschema::options().with_draft(Draft::Draft202012).build(schema) else {
        return false;
    };
    validator.iter_errors(arguments).next().is_none()
}

// ============================================================================
// SECTION: Tiered Strategy
// ============================================================================

/// Keyword-first planner with an optional model-assisted fallback.
///
/// # Invariants
/// - The keyword strategy always runs first; the model strategy runs only
///   when no keyword matched.
pub struct TieredPlanner {
    /// Deterministic first-pass strategy.
    keyword: KeywordPlanner,
    /// Optional second-pass strategy.
    model: Option<ModelPlanner>,
}

impl TieredPlanner {
    /// Creates a tiered planner from the two strategies.
    #[must_use]
    pub fn new(keyword: KeywordPlanner, model: Option<ModelPlanner>) -> Self {
        Self {
            keyword,
            model,
        }
    }
}

#[async_trait]
impl Planner for TieredPlanner {
    async fn plan(&self, ctx: PlanContext<'_>) -> Result<Plan, PlanError> {
        let plan = self.keyword.plan_keywords(ctx.input, ctx.tools);
        if !plan.is_empty() {
            return Ok(plan);
        }
        match &self.model {
            Some(model) => model.plan(ctx).await,
            None => Ok(Plan::empty()),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::core::GatewayError;
    use crate::core::ProviderError;
    use crate::core::ProviderResponse;
    use crate::core::RoleName;
    use crate::core::SideEffectClass;

    /// Completion stub returning a fixed response or a fixed failure.
    struct ScriptedCompleter {
        /// Scripted outcome for every call.
        outcome: Result<String, ()>,
    }

    #[async_trait]
    impl ChatCompleter for ScriptedCompleter {
        async fn complete(
            &self,
            _request: ProviderRequest,
            _deadline: Instant,
        ) -> Result<ProviderResponse, GatewayError> {
            match &self.outcome {
                Ok(content) => Ok(ProviderResponse {
                    content: content.clone(),
                    usage: None,
                }),
                Err(()) => Err(GatewayError::Provider {
                    attempts: 3,
                    last: ProviderError::Timeout,
                }),
            }
        }
    }

    fn ticket_spec() -> ToolSpec {
        ToolSpec {
            name: ToolName::new("create_ticket"),
            description: "Creates a ticket".to_string(),
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

    fn ticket_rule() -> KeywordRule {
        KeywordRule {
            trigger: "create ticket".to_string(),
            tool: ToolName::new("create_ticket"),
            arguments: json!({ "summary": "{rest}" }),
        }
    }

    fn ctx<'a>(input: &'a str, tools: &'a [ToolSpec]) -> PlanContext<'a> {
        PlanContext {
            input,
            tools,
            deadline: Instant::now() + Duration::from_secs(30),
        }
    }

    #[test]
    fn keyword_match_extracts_the_rest_of_the_input() {
        let planner = KeywordPlanner::new(vec![ticket_rule()]);
        let tools = vec![ticket_spec()];
        let plan = planner.plan_keywords("Create ticket: VPN is down", &tools);
        assert_eq!(plan.calls.len(), 1);
        assert_eq!(plan.calls[0].tool, ToolName::new("create_ticket"));
        assert_eq!(plan.calls[0].arguments, json!({ "summary": "VPN is down" }));
        assert_eq!(plan.calls[0].side_effect, SideEffectClass::Write);
    }

    #[test]
    fn keyword_planning_is_deterministic() {
        let planner = KeywordPlanner::new(vec![ticket_rule()]);
        let tools = vec![ticket_spec()];
        let first = planner.plan_keywords("please CREATE TICKET: printer jam", &tools);
        let second = planner.plan_keywords("please CREATE TICKET: printer jam", &tools);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn no_trigger_match_means_empty_plan() {
        let planner = KeywordPlanner::new(vec![ticket_rule()]);
        let tools = vec![ticket_spec()];
        let plan = planner.plan_keywords("How do I reset my password?", &tools);
        assert!(plan.is_empty());
    }

    #[test]
    fn rule_for_unregistered_tool_is_skipped() {
        let planner = KeywordPlanner::new(vec![KeywordRule {
            trigger: "create ticket".to_string(),
            tool: ToolName::new("missing_tool"),
            arguments: json!({}),
        }]);
        let tools = vec![ticket_spec()];
        assert!(planner.plan_keywords("create ticket: x", &tools).is_empty());
    }

    #[tokio::test]
    async fn malformed_model_json_degrades_to_empty_plan() {
        let planner = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok("not json at all".to_string()),
            }),
            "planner-model",
        );
        let tools = vec![ticket_spec()];
        let plan = planner.plan(ctx("open a ticket", &tools)).await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_in_model_output_degrades_to_empty_plan() {
        let content = json!({ "calls": [{ "tool": "rm_rf", "args": {} }] }).to_string();
        let planner = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok(content),
            }),
            "planner-model",
        );
        let tools = vec![ticket_spec()];
        assert!(planner.plan(ctx("open a ticket", &tools)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_violation_in_model_output_degrades_to_empty_plan() {
        let content =
            json!({ "calls": [{ "tool": "create_ticket", "args": { "priority": 1 } }] })
                .to_string();
        let planner = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok(content),
            }),
            "planner-model",
        );
        let tools = vec![ticket_spec()];
        assert!(planner.plan(ctx("open a ticket", &tools)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_conforming_model_output_becomes_a_plan() {
        let content =
            json!({ "calls": [{ "tool": "create_ticket", "args": { "summary": "VPN is down" } }] })
                .to_string();
        let planner = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok(content),
            }),
            "planner-model",
        );
        let tools = vec![ticket_spec()];
        let plan = planner.plan(ctx("open a ticket", &tools)).await.unwrap();
        assert_eq!(plan.calls.len(), 1);
        assert_eq!(plan.calls[0].arguments, json!({ "summary": "VPN is down" }));
    }

    #[tokio::test]
    async fn gateway_failure_degrades_to_empty_plan() {
        let planner = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Err(()),
            }),
            "planner-model",
        );
        let tools = vec![ticket_spec()];
        assert!(planner.plan(ctx("open a ticket", &tools)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tiered_planner_prefers_the_keyword_match() {
        let model = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok(json!({ "calls": [] }).to_string()),
            }),
            "planner-model",
        );
        let planner = TieredPlanner::new(KeywordPlanner::new(vec![ticket_rule()]), Some(model));
        let tools = vec![ticket_spec()];
        let plan = planner.plan(ctx("create ticket: VPN is down", &tools)).await.unwrap();
        assert_eq!(plan.calls.len(), 1);
    }

    #[tokio::test]
    async fn tiered_planner_falls_through_to_the_model() {
        let content =
            json!({ "calls": [{ "tool": "create_ticket", "args": { "summary": "reset" } }] })
                .to_string();
        let model = ModelPlanner::new(
            Arc::new(ScriptedCompleter {
                outcome: Ok(content),
            }),
            "planner-model",
        );
        let planner = TieredPlanner::new(KeywordPlanner::new(vec![ticket_rule()]), Some(model));
        let tools = vec![ticket_spec()];
        let plan = planner.plan(ctx("something unrelated", &tools)).await.unwrap();
        assert_eq!(plan.calls.len(), 1);
    }
}
