// crates/deskflow-core/src/core/trace.rs
// ============================================================================
// Module: Trace Identifier Policy
// Description: Sanitization and generation for client/server trace IDs.
// Purpose: Provide deterministic, fail-closed trace handling for requests.
// Dependencies: rand
// ============================================================================

//! ## Overview
//!
//! This module defines the trace identifier policy for Deskflow. Client
//! provided trace identifiers are **unsafe** and must be sanitized before
//! use. Invalid inputs are rejected to maintain strict, auditable
//! boundaries. Server trace IDs are generated per request using a
//! boot-scoped random seed plus a monotonic counter, and every audit event
//! for one request carries the same server-issued identifier.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::identifiers::TraceId;

/// Header name for client-provided trace identifiers.
pub const CLIENT_TRACE_HEADER: &str = "x-trace-id";
/// Header name for server-issued trace identifiers.
pub const SERVER_TRACE_HEADER: &str = "x-server-trace-id";
/// Maximum allowed length for client trace identifiers.
pub const MAX_CLIENT_TRACE_ID_LENGTH: usize = 128;

/// Typed rejection reason for invalid client trace IDs.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceIdRejection {
    /// Input was empty after trimming.
    EmptyAfterTrim,
    /// Input exceeded the maximum length.
    TooLong,
    /// Input contained whitespace after trimming.
    ContainsWhitespace,
    /// Input contained control characters after trimming.
    ContainsControlChar,
    /// Input contained non-ASCII characters.
    NonAscii,
    /// Input contained disallowed ASCII characters.
    ContainsDisallowedChar,
}

impl TraceIdRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EmptyAfterTrim => "empty_after_trim",
            Self::TooLong => "too_long",
            Self::ContainsWhitespace => "contains_whitespace",
            Self::ContainsControlChar => "contains_control_char",
            Self::NonAscii => "non_ascii",
            Self::ContainsDisallowedChar => "contains_disallowed_char",
        }
    }
}

impl fmt::Display for TraceIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trace context containing unsafe client and server identifiers.
///
/// # Invariants
/// - `server_id` is always populated for issued contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// Sanitized client trace ID (unsafe input).
    pub unsafe_client_id: Option<String>,
    /// Server-generated trace ID.
    pub server_id: TraceId,
}

impl TraceContext {
    /// Builds a trace context from a client header and generator.
    ///
    /// # Errors
    /// Returns [`TraceIdRejection`] when the client ID is invalid.
    pub fn from_header(
        header: Option<&str>,
        generator: &TraceIdGenerator,
    ) -> Result<Self, TraceIdRejection> {
        let unsafe_client_id = sanitize_client_trace_id(header)?;
        let server_id = generator.issue();
        Ok(Self {
            unsafe_client_id,
            server_id,
        })
    }
}

/// Boot-scoped trace ID generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct TraceIdGenerator {
    /// Prefix included in every generated trace ID.
    prefix: &'static str,
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for IDs issued in this process.
    counter: AtomicU64,
}

impl TraceIdGenerator {
    /// Creates a new generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            prefix,
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a new server trace ID.
    #[must_use]
    pub fn issue(&self) -> TraceId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        TraceId::new(format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, seq))
    }
}

/// Sanitizes a client trace ID using strict token rules.
///
/// Returns `Ok(None)` when no header value is provided. Any invalid value
/// returns a structured rejection reason.
///
/// # Errors
/// Returns [`TraceIdRejection`] when the value is empty, too long, or
/// contains disallowed characters.
pub fn sanitize_client_trace_id(
    value: Option<&str>,
) -> Result<Option<String>, TraceIdRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TraceIdRejection::EmptyAfterTrim);
    }
    if trimmed.len() > MAX_CLIENT_TRACE_ID_LENGTH {
        return Err(TraceIdRejection::TooLong);
    }
    for ch in trimmed.chars() {
        if !ch.is_ascii() {
            return Err(TraceIdRejection::NonAscii);
        }
        if ch.is_ascii_whitespace() {
            return Err(TraceIdRejection::ContainsWhitespace);
        }
        if ch.is_control() {
            return Err(TraceIdRejection::ContainsControlChar);
        }
        if !is_tchar(ch) {
            return Err(TraceIdRejection::ContainsDisallowedChar);
        }
    }
    Ok(Some(trimmed.to_string()))
}

/// Returns true when the character is a valid HTTP token character.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
