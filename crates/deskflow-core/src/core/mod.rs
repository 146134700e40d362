// crates/deskflow-core/src/core/mod.rs
// ============================================================================
// Module: Deskflow Core Types
// Description: Canonical Deskflow data model and error taxonomy.
// Purpose: Provide stable, serializable types for requests, tools, and audit.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Deskflow core types define the request/response data model, tool
//! specifications and plans, provider chat shapes, the error taxonomy, and
//! audit event payloads. These types are the canonical source of truth for
//! any derived API surfaces.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod chat;
pub mod claims;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod request;
pub mod time;
pub mod tool;
pub mod trace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditDecision;
pub use audit::AuditEvent;
pub use audit::RunAuditParams;
pub use audit::ToolAuditParams;
pub use chat::ChatMessage;
pub use chat::ChatRole;
pub use chat::GenerationParams;
pub use chat::OutputFormat;
pub use chat::ProviderRequest;
pub use chat::ProviderResponse;
pub use chat::TokenUsage;
pub use claims::CallerClaims;
pub use error::GatewayError;
pub use error::OrchestratorError;
pub use error::PlanError;
pub use error::ProviderError;
pub use error::RetrievalError;
pub use error::StoreError;
pub use error::ToolError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::AgentName;
pub use identifiers::RoleName;
pub use identifiers::ToolName;
pub use identifiers::TraceId;
pub use request::AgentRequest;
pub use request::AgentResponse;
pub use request::Chunk;
pub use request::Dialogue;
pub use time::now_ms;
pub use tool::Plan;
pub use tool::SideEffectClass;
pub use tool::ToolCall;
pub use tool::ToolOutcome;
pub use tool::ToolResult;
pub use tool::ToolSpec;
pub use trace::CLIENT_TRACE_HEADER;
pub use trace::MAX_CLIENT_TRACE_ID_LENGTH;
pub use trace::SERVER_TRACE_HEADER;
pub use trace::TraceContext;
pub use trace::TraceIdGenerator;
pub use trace::TraceIdRejection;
pub use trace::sanitize_client_trace_id;
