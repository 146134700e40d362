// crates/deskflow-core/src/lib.rs
// ============================================================================
// Module: Deskflow Core Library
// Description: Public API surface for the Deskflow core.
// Purpose: Expose core types, interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Deskflow core provides the request-orchestration runtime: data model,
//! error taxonomy, tool registry, planner strategies, retrieval, dialogue
//! persistence, and the orchestrator sequencing them. It is backend-agnostic
//! and integrates with providers, stores, and sinks through explicit
//! interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditSink;
pub use interfaces::ChatBackend;
pub use interfaces::ChatCompleter;
pub use interfaces::DialogueStore;
pub use interfaces::PlanContext;
pub use interfaces::Planner;
pub use interfaces::Retriever;
pub use interfaces::ToolHandler;
pub use runtime::Document;
pub use runtime::InMemoryDialogueStore;
pub use runtime::InMemoryRetriever;
pub use runtime::KeywordPlanner;
pub use runtime::KeywordRule;
pub use runtime::ModelPlanner;
pub use runtime::Orchestrator;
pub use runtime::OrchestratorConfig;
pub use runtime::OrchestratorParts;
pub use runtime::RegistryError;
pub use runtime::TieredPlanner;
pub use runtime::ToolRegistry;
