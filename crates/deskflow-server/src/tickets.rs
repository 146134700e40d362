// crates/deskflow-server/src/tickets.rs
// ============================================================================
// Module: Ticket Service Tool
// Description: Write-class tool handler for the ticket CRUD microservice.
// Purpose: Create tickets through the external service with bounded IO.
// Dependencies: deskflow-config, deskflow-core, reqwest
// ============================================================================

//! ## Overview
//! The ticket service is an external collaborator: this module only carries
//! the narrow client posting one create request per invocation. The handler
//! is registered as a `write`-class tool, so the registry enforces the role
//! gate and schema validation before this code ever runs; everything that
//! fails here is an upstream error. Redirects are disabled and every call is
//! bounded by the registry's handler budget plus the client timeout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use deskflow_config::TicketServiceConfig;
use deskflow_core::CallerClaims;
use deskflow_core::RoleName;
use deskflow_core::SideEffectClass;
use deskflow_core::ToolError;
use deskflow_core::ToolName;
use deskflow_core::ToolSpec;
use deskflow_core::interfaces::ToolHandler;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Registered name of the ticket creation tool.
pub const CREATE_TICKET_TOOL: &str = "create_ticket";

/// User agent sent on every ticket-service request.
const USER_AGENT: &str = concat!("deskflow/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors constructing the ticket-service client.
#[derive(Debug, Error)]
pub enum TicketClientError {
    /// The underlying HTTP client failed to build.
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

// ============================================================================
// SECTION: Tool Specification
// ============================================================================

/// Builds the registry specification for the ticket creation tool.
#[must_use]
pub fn ticket_tool_spec(config: &TicketServiceConfig) -> ToolSpec {
    ToolSpec {
        name: ToolName::new(CREATE_TICKET_TOOL),
        description: "Creates a ticket in the ticketing system.".to_string(),
        args_schema: json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "minLength": 1 },
                "description": { "type": "string" }
            },
            "required": ["title"],
            "additionalProperties": false
        }),
        side_effect: SideEffectClass::Write,
        required_roles: config.required_roles.iter().map(RoleName::new).collect(),
        timeout_ms: config.timeout_ms,
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Outbound ticket creation payload.
#[derive(Serialize)]
struct CreateTicketBody<'a> {
    /// Ticket title.
    title: &'a str,
    /// Ticket description.
    description: &'a str,
    /// Subject of the caller creating the ticket.
    requester: &'a str,
}

/// HTTP client for the external ticket CRUD microservice.
///
/// # Invariants
/// - One request per invocation; the registry owns at-most-once dispatch.
/// - Redirects are never followed.
pub struct TicketServiceClient {
    /// Ticket creation endpoint.
    endpoint: String,
    /// Per-request timeout.
    timeout: Duration,
    /// Shared HTTP client.
    client: Client,
}

impl TicketServiceClient {
    /// Creates a client from ticket-service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TicketClientError`] when the HTTP client cannot be built.
    pub fn new(config: &TicketServiceConfig) -> Result<Self, TicketClientError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client,
        })
    }

    /// Maps a failure into the upstream tool error shape.
    fn upstream(message: String) -> ToolError {
        ToolError::Upstream {
            tool: ToolName::new(CREATE_TICKET_TOOL),
            message,
        }
    }
}

#[async_trait]
impl ToolHandler for TicketServiceClient {
    async fn invoke(&self, arguments: &Value, claims: &CallerClaims) -> Result<Value, ToolError> {
        let title = arguments
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| Self::upstream("arguments missing title".to_string()))?;
        let description = arguments.get("description").and_then(Value::as_str).unwrap_or("");
        let body = CreateTicketBody {
            title,
            description,
            requester: &claims.subject,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| Self::upstream(format!("ticket service unreachable: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::upstream(format!("ticket service returned {status}")));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| Self::upstream(format!("malformed ticket response: {err}")))?;
        Ok(payload)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
