// crates/deskflow-server/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Axum entry point exposing the agent run endpoint.
// Purpose: Wire configuration into the runtime and serve requests.
// Dependencies: deskflow-audit, deskflow-config, deskflow-core, deskflow-gateway, axum, tokio
// ============================================================================

//! ## Overview
//! The server owns startup wiring and the HTTP boundary. All collaborators
//! are built once from validated configuration (registry, planner, gateway,
//! retriever, store, audit) and shared immutably; each request verifies the
//! bearer identity, derives a trace context and deadline, and hands one
//! [`AgentRequest`] to the orchestrator. Status mapping is fixed: 400 for an
//! unknown agent, 401 for identity failures, 413 for oversized bodies, 422
//! for malformed bodies, 503 before readiness. Inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use deskflow_audit::BoundedAuditPublisher;
use deskflow_audit::FileAuditSink;
use deskflow_audit::NoopAuditSink;
use deskflow_audit::StderrAuditSink;
use deskflow_config::AuditSinkKind;
use deskflow_config::DeskflowConfig;
use deskflow_core::AgentName;
use deskflow_core::AgentRequest;
use deskflow_core::AgentResponse;
use deskflow_core::CLIENT_TRACE_HEADER;
use deskflow_core::Document;
use deskflow_core::GenerationParams;
use deskflow_core::InMemoryDialogueStore;
use deskflow_core::InMemoryRetriever;
use deskflow_core::KeywordPlanner;
use deskflow_core::KeywordRule;
use deskflow_core::ModelPlanner;
use deskflow_core::Orchestrator;
use deskflow_core::OrchestratorConfig;
use deskflow_core::OrchestratorError;
use deskflow_core::OrchestratorParts;
use deskflow_core::SERVER_TRACE_HEADER;
use deskflow_core::TieredPlanner;
use deskflow_core::ToolName;
use deskflow_core::ToolRegistry;
use deskflow_core::TraceContext;
use deskflow_core::TraceIdGenerator;
use deskflow_core::interfaces::AuditSink;
use deskflow_core::interfaces::ChatCompleter;
use deskflow_gateway::Guardrails;
use deskflow_gateway::HttpChatBackend;
use deskflow_gateway::ModelGateway;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::identity::BearerIdentityVerifier;
use crate::identity::IdentityError;
use crate::tickets::TicketServiceClient;
use crate::tickets::ticket_tool_spec;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration was invalid.
    #[error("config: {0}")]
    Config(String),
    /// A collaborator failed to initialize.
    #[error("init: {0}")]
    Init(String),
    /// The HTTP transport failed.
    #[error("transport: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Trace identifier prefix for server-issued ids.
const TRACE_ID_PREFIX: &str = "df";

/// Shared state behind the HTTP handlers.
pub struct AppState {
    /// Request pipeline.
    orchestrator: Orchestrator,
    /// Bearer-token verifier.
    verifier: BearerIdentityVerifier,
    /// Boot-scoped trace id generator.
    trace_ids: TraceIdGenerator,
    /// End-to-end deadline applied to every request.
    request_timeout: Duration,
    /// Readiness computed at startup.
    ready: bool,
}

/// Deskflow HTTP server instance.
pub struct AppServer {
    /// Bind address for the listener.
    bind: String,
    /// Maximum request body size in bytes.
    max_body_bytes: usize,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl AppServer {
    /// Builds the server and all collaborators from configuration.
    ///
    /// Must be called from within a Tokio runtime (the audit publisher
    /// spawns its drain task).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(config: DeskflowConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;

        let mut registry = ToolRegistry::new();
        if let Some(ticket) = &config.tools.ticket_service {
            let handler = TicketServiceClient::new(ticket)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            registry
                .register(ticket_tool_spec(ticket), Arc::new(handler))
                .map_err(|err| ServerError::Init(err.to_string()))?;
        }
        let registry = Arc::new(registry);

        let backend = HttpChatBackend::new(
            "primary",
            &config.gateway.endpoint,
            config.gateway.api_key.clone(),
        )
        .map_err(|err| ServerError::Init(err.to_string()))?;
        let gateway = ModelGateway::new(
            Arc::new(backend),
            Guardrails::new(config.gateway.guardrails.clone()),
            config.gateway.retry.clone(),
        )
        .with_attempt_timeout(Duration::from_millis(config.gateway.attempt_timeout_ms));
        let completer: Arc<dyn ChatCompleter> = Arc::new(gateway);

        let rules = config
            .planner
            .rules
            .iter()
            .map(|rule| KeywordRule {
                trigger: rule.trigger.clone(),
                tool: ToolName::new(&rule.tool),
                arguments: rule.args.clone(),
            })
            .collect();
        let model = config
            .planner
            .use_model
            .then(|| ModelPlanner::new(Arc::clone(&completer), config.gateway.model.clone()));
        let planner = TieredPlanner::new(KeywordPlanner::new(rules), model);

        let documents = config
            .retrieval
            .documents
            .iter()
            .map(|document| Document {
                source: document.source.clone(),
                text: document.text.clone(),
            })
            .collect();
        let retriever = InMemoryRetriever::new(documents);

        let audit = build_audit_sink(&config)?;
        let agents: BTreeSet<AgentName> =
            config.agents.iter().map(AgentName::new).collect();
        let ready = !registry.is_empty();

        let orchestrator = Orchestrator::new(
            OrchestratorParts {
                agents,
                registry,
                planner: Arc::new(planner),
                retriever: Arc::new(retriever),
                completer,
                store: Arc::new(InMemoryDialogueStore::new()),
                audit,
            },
            OrchestratorConfig {
                retrieval_top_k: config.retrieval.top_k,
                answer_model: config.gateway.model.clone(),
                compose_params: GenerationParams::default(),
                ..OrchestratorConfig::default()
            },
        );

        let state = Arc::new(AppState {
            orchestrator,
            verifier: BearerIdentityVerifier::from_config(&config.identity),
            trace_ids: TraceIdGenerator::new(TRACE_ID_PREFIX),
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            ready,
        });
        Ok(Self {
            bind: config.server.bind.clone(),
            max_body_bytes: config.server.max_body_bytes,
            state,
        })
    }

    /// Returns the router for this server instance.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state), self.max_body_bytes)
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .bind
            .parse()
            .map_err(|_| ServerError::Config("invalid bind address".to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the configured audit sink behind the bounded publisher.
fn build_audit_sink(config: &DeskflowConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    let inner: Arc<dyn AuditSink> = match config.audit.sink {
        AuditSinkKind::Stderr => Arc::new(StderrAuditSink),
        AuditSinkKind::Noop => Arc::new(NoopAuditSink),
        AuditSinkKind::File => {
            let path = config
                .audit
                .path
                .as_ref()
                .ok_or_else(|| ServerError::Config("file audit sink requires path".to_string()))?;
            let sink =
                FileAuditSink::new(path).map_err(|err| ServerError::Init(err.to_string()))?;
            Arc::new(sink)
        }
    };
    Ok(BoundedAuditPublisher::spawn_with_capacity(inner, config.audit.queue_capacity))
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Builds the HTTP router over shared state.
fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/agents/run", post(handle_run))
        .route("/healthz", get(handle_healthz))
        .route("/readyz", get(handle_readyz))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Inbound agent run request body.
#[derive(Debug, Deserialize)]
struct RunRequestBody {
    /// Agent profile to address.
    agent: String,
    /// Free-text task input.
    input: String,
    /// Opaque request metadata.
    #[serde(default)]
    meta: Value,
}

/// Successful agent run response body.
#[derive(Debug, Serialize)]
struct RunResponseBody {
    /// Composed answer text.
    output: String,
    /// Trace identifier for correlation.
    reasoning_trace_id: String,
    /// Tools that executed successfully, in order.
    used_tools: Vec<ToolName>,
}

/// Constant-shape error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable error label.
    error: &'static str,
}

/// Builds an error response with a stable label.
fn error_response(status: StatusCode, error: &'static str) -> Response {
    (status, axum::Json(ErrorBody {
        error,
    }))
        .into_response()
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness probe.
async fn handle_healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe gated on startup wiring.
async fn handle_readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Handles one agent run request.
async fn handle_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    if !state.ready {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "not_ready");
    }
    let auth_header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let claims = match state.verifier.verify(auth_header) {
        Ok(claims) => claims,
        Err(IdentityError::Missing | IdentityError::Invalid) => {
            return error_response(StatusCode::UNAUTHORIZED, "unauthenticated");
        }
    };
    let body: RunRequestBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(_) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, "malformed_body"),
    };
    if body.input.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "malformed_body");
    }
    let client_trace = headers.get(CLIENT_TRACE_HEADER).and_then(|value| value.to_str().ok());
    let trace = match TraceContext::from_header(client_trace, &state.trace_ids) {
        Ok(trace) => trace,
        Err(_) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid_trace_header"),
    };
    let request = AgentRequest {
        agent: AgentName::new(body.agent),
        input: body.input,
        claims,
        metadata: body.meta,
        trace_id: trace.server_id.clone(),
        deadline: Instant::now() + state.request_timeout,
    };
    match state.orchestrator.handle(request).await {
        Ok(response) => run_response(&trace.server_id, response),
        Err(OrchestratorError::UnknownAgent {
            ..
        }) => error_response(StatusCode::BAD_REQUEST, "unknown_agent"),
    }
}

/// Builds the success response with the trace header echoed.
fn run_response(trace_id: &deskflow_core::TraceId, response: AgentResponse) -> Response {
    let body = RunResponseBody {
        output: response.output,
        reasoning_trace_id: response.reasoning_trace_id.as_str().to_string(),
        used_tools: response.used_tools,
    };
    let mut http = (StatusCode::OK, axum::Json(body)).into_response();
    if let Ok(value) = trace_id.as_str().parse() {
        http.headers_mut().insert(SERVER_TRACE_HEADER, value);
    }
    http
}
