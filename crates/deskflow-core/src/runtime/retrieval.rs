// crates/deskflow-core/src/runtime/retrieval.rs
// ============================================================================
// Module: In-Memory Retrieval
// Description: Deterministic token-overlap retriever over configured documents.
// Purpose: Provide a retrieval implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a deterministic in-memory implementation of
//! [`Retriever`] scoring documents by distinct query-token overlap. The
//! production vector store is an external collaborator behind the same
//! trait; this implementation serves local deployments and tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::core::Chunk;
use crate::core::RetrievalError;
use crate::interfaces::Retriever;

// ============================================================================
// SECTION: Documents
// ============================================================================

/// One configured knowledge document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable source identifier.
    pub source: String,
    /// Document text.
    pub text: String,
}

// ============================================================================
// SECTION: In-Memory Retriever
// ============================================================================

/// Deterministic token-overlap retriever.
///
/// # Invariants
/// - Results are ordered score-descending, ties broken by insertion order.
/// - Zero-overlap documents are never returned.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    /// Documents scored per query, in insertion order.
    documents: Vec<Document>,
}

impl InMemoryRetriever {
    /// Creates a retriever over the given documents.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
        }
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let mut scored: Vec<Chunk> = Vec::new();
        for document in &self.documents {
            let doc_tokens = tokenize(&document.text);
            let overlap = query_tokens.intersection(&doc_tokens).count();
            if overlap == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss, reason = "token counts are small")]
            let score = overlap as f64 / query_tokens.len() as f64;
            scored.push(Chunk {
                source: document.source.clone(),
                text: document.text.clone(),
                score,
            });
        }
        // Stable sort preserves insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Splits text into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
