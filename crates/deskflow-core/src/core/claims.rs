// crates/deskflow-core/src/core/claims.rs
// ============================================================================
// Module: Caller Claims
// Description: Verified caller identity and role set for one request.
// Purpose: Provide the authorization input consumed by the tool registry.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Caller claims are produced by the identity verifier at the entry boundary
//! and treated as immutable for the rest of the request. The tool registry
//! consults them before dispatching any write- or execute-class handler.
//! Role comparison is exact; no wildcard or hierarchy semantics exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RoleName;

// ============================================================================
// SECTION: Caller Claims
// ============================================================================

/// Verified caller identity and role set.
///
/// # Invariants
/// - Produced only by the identity boundary; never constructed from
///   unverified request fields.
/// - Immutable for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerClaims {
    /// Stable subject identifier for the caller.
    pub subject: String,
    /// Roles granted to the caller.
    pub roles: BTreeSet<RoleName>,
}

impl CallerClaims {
    /// Creates claims for a subject with the given roles.
    #[must_use]
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Returns true when the caller holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }

    /// Returns true when the caller holds at least one of the given roles.
    ///
    /// An empty requirement set grants nothing; authorization fails closed.
    #[must_use]
    pub fn has_any_role<'a>(&self, required: impl IntoIterator<Item = &'a RoleName>) -> bool {
        required.into_iter().any(|role| self.roles.contains(role))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_any_role_matches_single_overlap() {
        let claims = CallerClaims::new("alice", [RoleName::new("ticket_writer")]);
        let required = [RoleName::new("admin"), RoleName::new("ticket_writer")];
        assert!(claims.has_any_role(required.iter()));
    }

    #[test]
    fn empty_requirement_set_grants_nothing() {
        let claims = CallerClaims::new("alice", [RoleName::new("ticket_writer")]);
        assert!(!claims.has_any_role([].iter()));
    }

    #[test]
    fn missing_role_is_denied() {
        let claims = CallerClaims::new("bob", [RoleName::new("reader")]);
        assert!(!claims.has_role(&RoleName::new("ticket_writer")));
    }
}
