// crates/deskflow-server/src/lib.rs
// ============================================================================
// Module: Deskflow Server
// Description: HTTP entry point, identity verification, and tool wiring.
// Purpose: Expose the orchestration runtime over one authenticated endpoint.
// Dependencies: deskflow-audit, deskflow-config, deskflow-core, deskflow-gateway, axum
// ============================================================================

//! ## Overview
//! The server crate turns validated configuration into a running service:
//! `POST /v1/agents/run` behind bearer-token identity, liveness and
//! readiness probes, and the ticket-service tool client. Everything
//! stateful is built once at startup and shared immutably across requests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identity;
pub mod server;
pub mod tickets;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use identity::BearerIdentityVerifier;
pub use identity::IdentityError;
pub use server::AppServer;
pub use server::ServerError;
pub use tickets::CREATE_TICKET_TOOL;
pub use tickets::TicketServiceClient;
pub use tickets::ticket_tool_spec;
