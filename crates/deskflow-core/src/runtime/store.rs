// crates/deskflow-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Dialogue Store
// Description: Bounded in-memory dialogue persistence for tests and demos.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a bounded in-memory implementation of
//! [`DialogueStore`]. Dialogue persistence is best-effort by contract, so a
//! ring of the most recent entries is sufficient; durable stores are
//! external collaborators behind the same trait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::Dialogue;
use crate::core::StoreError;
use crate::interfaces::DialogueStore;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Default number of retained dialogues.
const DEFAULT_MAX_DIALOGUES: usize = 1_000;

/// Bounded in-memory dialogue store.
///
/// # Invariants
/// - Retains at most `max_entries` dialogues; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct InMemoryDialogueStore {
    /// Retained dialogues, oldest first.
    entries: Arc<RwLock<VecDeque<Dialogue>>>,
    /// Maximum retained entries.
    max_entries: usize,
}

impl Default for InMemoryDialogueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDialogueStore {
    /// Creates a store with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_DIALOGUES)
    }

    /// Creates a store retaining at most `max_entries` dialogues.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: max_entries.max(1),
        }
    }
}

impl DialogueStore for InMemoryDialogueStore {
    fn save(&self, dialogue: &Dialogue) -> Result<(), StoreError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| StoreError::Store("dialogue store lock poisoned".to_string()))?;
        if guard.len() == self.max_entries {
            guard.pop_front();
        }
        guard.push_back(dialogue.clone());
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Dialogue>, StoreError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| StoreError::Store("dialogue store lock poisoned".to_string()))?;
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
