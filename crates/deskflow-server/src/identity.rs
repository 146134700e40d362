// crates/deskflow-server/src/identity.rs
// ============================================================================
// Module: Identity Verification
// Description: Bearer-token verification producing caller claims.
// Purpose: Map inbound credentials to an immutable subject and role set.
// Dependencies: deskflow-config, deskflow-core
// ============================================================================

//! ## Overview
//! The in-tree verifier is a static bearer-token table resolved from
//! configuration; the production token service is an external collaborator
//! behind the same shape. Verification fails closed: a missing, oversized,
//! malformed, or unknown credential yields the same constant-shape error so
//! responses leak nothing about which tokens exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use deskflow_config::IdentityConfig;
use deskflow_core::CallerClaims;
use deskflow_core::RoleName;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size in bytes.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// Bearer scheme prefix on the authorization header.
const BEARER_PREFIX: &str = "Bearer ";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No authorization header was presented.
    #[error("missing credentials")]
    Missing,
    /// The presented credential was malformed, oversized, or unknown.
    #[error("invalid credentials")]
    Invalid,
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Identity bound to one bearer token.
struct TokenIdentity {
    /// Caller subject.
    subject: String,
    /// Roles granted to the subject.
    roles: BTreeSet<RoleName>,
}

/// Static bearer-token verifier.
///
/// # Invariants
/// - Immutable after construction; tokens are never logged.
pub struct BearerIdentityVerifier {
    /// Token table keyed by the opaque token value.
    tokens: BTreeMap<String, TokenIdentity>,
}

impl BearerIdentityVerifier {
    /// Builds the verifier from the configured token table.
    #[must_use]
    pub fn from_config(config: &IdentityConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|entry| {
                let identity = TokenIdentity {
                    subject: entry.subject.clone(),
                    roles: entry.roles.iter().map(RoleName::new).collect(),
                };
                (entry.token.clone(), identity)
            })
            .collect();
        Self {
            tokens,
        }
    }

    /// Verifies an authorization header value into caller claims.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Missing`] when no header is present and
    /// [`IdentityError::Invalid`] for every other failure.
    pub fn verify(&self, header: Option<&str>) -> Result<CallerClaims, IdentityError> {
        let header = header.ok_or(IdentityError::Missing)?;
        if header.len() > MAX_AUTH_HEADER_BYTES {
            return Err(IdentityError::Invalid);
        }
        let token = header.strip_prefix(BEARER_PREFIX).ok_or(IdentityError::Invalid)?.trim();
        if token.is_empty() {
            return Err(IdentityError::Invalid);
        }
        let identity = self.tokens.get(token).ok_or(IdentityError::Invalid)?;
        Ok(CallerClaims::new(identity.subject.clone(), identity.roles.iter().cloned()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use deskflow_config::IdentityToken;

    use super::*;

    fn verifier() -> BearerIdentityVerifier {
        BearerIdentityVerifier::from_config(&IdentityConfig {
            tokens: vec![IdentityToken {
                token: "secret-token".to_string(),
                subject: "user-1".to_string(),
                roles: vec!["agent".to_string()],
            }],
        })
    }

    #[test]
    fn known_token_yields_subject_and_roles() {
        let claims = verifier().verify(Some("Bearer secret-token")).unwrap();
        assert_eq!(claims.subject, "user-1");
        assert!(claims.has_role(&RoleName::new("agent")));
    }

    #[test]
    fn missing_header_is_distinct_from_invalid() {
        assert_eq!(verifier().verify(None).unwrap_err(), IdentityError::Missing);
    }

    #[test]
    fn unknown_and_malformed_tokens_fail_identically() {
        let verifier = verifier();
        let unknown = verifier.verify(Some("Bearer nope")).unwrap_err();
        let malformed = verifier.verify(Some("Basic secret-token")).unwrap_err();
        assert_eq!(unknown, IdentityError::Invalid);
        assert_eq!(malformed, IdentityError::Invalid);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let header = format!("Bearer {}", "x".repeat(MAX_AUTH_HEADER_BYTES));
        assert_eq!(verifier().verify(Some(&header)).unwrap_err(), IdentityError::Invalid);
    }
}
