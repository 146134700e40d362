// crates/deskflow-gateway/src/lib.rs
// ============================================================================
// Module: Deskflow Gateway
// Description: Model gateway with guardrails, retries, and HTTP backends.
// Purpose: Give the runtime one guarded completion surface per deployment.
// Dependencies: deskflow-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! This crate owns everything between the runtime and a model provider:
//! prompt guardrails, failure classification, the jittered retry loop, and
//! the HTTP wire adapter. The runtime only sees the [`ChatCompleter`]
//! surface from `deskflow-core`; provider selection is a static
//! configuration concern resolved once at startup.
//!
//! [`ChatCompleter`]: deskflow_core::interfaces::ChatCompleter

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod backoff;
pub mod gateway;
pub mod guardrails;
pub mod http;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use backoff::RetryPolicy;
pub use gateway::BackendRouter;
pub use gateway::ModelGateway;
pub use guardrails::GuardrailConfig;
pub use guardrails::Guardrails;
pub use guardrails::OverLengthAction;
pub use http::HttpBackendError;
pub use http::HttpChatBackend;
