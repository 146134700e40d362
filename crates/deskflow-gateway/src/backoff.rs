// crates/deskflow-gateway/src/backoff.rs
// ============================================================================
// Module: Retry Backoff
// Description: Exponential backoff with full jitter and retry-after override.
// Purpose: Compute bounded retry delays for transient provider failures.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Delays follow full-jitter exponential backoff: a value drawn uniformly
//! from `[0, min(cap, base * 2^attempt)]`, avoiding retry storms against an
//! already-overloaded provider. An explicit retry-after hint from the
//! provider overrides the computed delay for that attempt. The policy only
//! computes delays; deadline accounting lives in the gateway loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;
use rand::rngs::OsRng;
use serde::Deserialize;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry policy for transient provider failures.
///
/// # Invariants
/// - `max_attempts >= 1`; the first attempt is not a retry.
/// - Computed delays never exceed `max_delay_ms` (hints may).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Maximum provider attempts, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds before exponentiation.
    pub base_delay_ms: u64,
    /// Hard cap on the computed delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before the retry following `attempt` (0-based).
    ///
    /// A provider retry-after hint overrides the jittered delay.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(hint) = retry_after_ms {
            return Duration::from_millis(hint);
        }
        let exponent = self.base_delay_ms.saturating_mul(1_u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let cap = exponent.min(self.max_delay_ms);
        Duration::from_millis(OsRng.gen_range(0..=cap))
    }

    /// Returns the worst-case total delay across all retries.
    #[must_use]
    pub fn max_total_delay(&self) -> Duration {
        let retries = u64::from(self.max_attempts.saturating_sub(1));
        Duration::from_millis(self.max_delay_ms.saturating_mul(retries))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
