// crates/deskflow-config/src/lib.rs
// ============================================================================
// Module: Deskflow Config
// Description: Strict TOML configuration for the Deskflow runtime.
// Purpose: Parse and validate deployment configuration fail-closed.
// Dependencies: deskflow-gateway, serde, toml
// ============================================================================

//! ## Overview
//! All runtime wiring comes from one TOML file: server limits, the identity
//! token table, gateway endpoint and retry policy, planner rules, tool
//! wiring, the retrieval corpus, and audit sink selection. Every section is
//! validated against named hard limits before the server starts; an invalid
//! field is a [`ConfigError`] naming the field.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use config::AuditConfig;
pub use config::AuditSinkKind;
pub use config::ConfigError;
pub use config::DeskflowConfig;
pub use config::DocumentConfig;
pub use config::GatewayConfig;
pub use config::IdentityConfig;
pub use config::IdentityToken;
pub use config::KeywordRuleConfig;
pub use config::PlannerConfig;
pub use config::RetrievalConfig;
pub use config::ServerConfig;
pub use config::TicketServiceConfig;
pub use config::ToolsConfig;
