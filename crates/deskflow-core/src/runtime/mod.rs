// crates/deskflow-core/src/runtime/mod.rs
// ============================================================================
// Module: Deskflow Runtime
// Description: Orchestrator, registry, planner, retrieval, and store runtime.
// Purpose: Provide the request pipeline over the core data model.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime wires the core data model to concrete pipeline components:
//! the tool registry, planner strategies, in-memory retrieval and dialogue
//! store, and the orchestrator that sequences them per request.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod retrieval;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::OrchestratorParts;
pub use planner::KeywordPlanner;
pub use planner::KeywordRule;
pub use planner::ModelPlanner;
pub use planner::TieredPlanner;
pub use registry::RegistryError;
pub use registry::ToolRegistry;
pub use retrieval::Document;
pub use retrieval::InMemoryRetriever;
pub use store::InMemoryDialogueStore;
