// crates/deskflow-audit/src/lib.rs
// ============================================================================
// Module: Deskflow Audit
// Description: Audit sinks and the non-blocking publisher.
// Purpose: Record every authorization-relevant action as JSON lines.
// Dependencies: deskflow-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Audit is the observability surface of the runtime: every tool attempt and
//! every request summary flows through an [`AuditSink`] from
//! `deskflow-core`. This crate supplies the concrete destinations (stderr,
//! append-only file, no-op) and a bounded publisher that keeps slow
//! destinations off the request path. Sinks never fail the request: audit IO
//! problems drop events, they do not change decisions.
//!
//! [`AuditSink`]: deskflow_core::interfaces::AuditSink

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod publisher;
pub mod sinks;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use publisher::BoundedAuditPublisher;
pub use sinks::FileAuditSink;
pub use sinks::NoopAuditSink;
pub use sinks::StderrAuditSink;
