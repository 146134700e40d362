// crates/deskflow-core/src/core/time.rs
// ============================================================================
// Module: Time Helpers
// Description: Wall-clock timestamp helper for audit and dialogue records.
// Purpose: Provide one consistent epoch-millisecond source.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Audit events and dialogue records carry epoch milliseconds. A clock that
//! reads before the epoch yields zero rather than failing the request path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time as milliseconds since the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
