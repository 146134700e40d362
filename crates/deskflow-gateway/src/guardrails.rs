// crates/deskflow-gateway/src/guardrails.rs
// ============================================================================
// Module: Prompt Guardrails
// Description: Length and blocklist checks on outbound provider traffic.
// Purpose: Reject or truncate unsafe prompts before any provider attempt.
// Dependencies: deskflow-core
// ============================================================================

//! ## Overview
//! Guardrails run before the first provider attempt and are independent of
//! provider-level transport errors: a violation is a [`GatewayError::Guardrail`],
//! never a retried provider failure. Length handling is a configuration
//! switch — reject (default, fail closed) or truncate from the end of the
//! message list. Blocklist matching is ASCII-case-insensitive over every
//! message body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use deskflow_core::GatewayError;
use deskflow_core::ProviderRequest;
use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Behavior when a prompt exceeds the configured length cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverLengthAction {
    /// Reject the request with a guardrail violation.
    #[default]
    Reject,
    /// Truncate message contents from the end until the prompt fits.
    Truncate,
}

/// Guardrail configuration.
///
/// # Invariants
/// - `max_prompt_chars` is a hard cap over all message contents combined.
/// - Blocklist entries are matched case-insensitively as substrings.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    /// Maximum total prompt length in characters.
    pub max_prompt_chars: usize,
    /// Over-length handling switch.
    pub on_over_length: OverLengthAction,
    /// Blocked phrases.
    pub blocklist: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 16_000,
            on_over_length: OverLengthAction::Reject,
            blocklist: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Guardrails
// ============================================================================

/// Compiled guardrails applied to every gateway request.
#[derive(Debug, Clone)]
pub struct Guardrails {
    /// Active configuration.
    config: GuardrailConfig,
    /// Blocklist lowered once at construction.
    blocklist: Vec<String>,
}

impl Guardrails {
    /// Creates guardrails from configuration.
    #[must_use]
    pub fn new(config: GuardrailConfig) -> Self {
        let blocklist =
            config.blocklist.iter().map(|phrase| phrase.to_ascii_lowercase()).collect();
        Self {
            config,
            blocklist,
        }
    }

    /// Applies guardrails, possibly truncating message contents in place.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Guardrail`] for a blocklist hit or an
    /// over-length prompt under the reject policy.
    pub fn apply(&self, request: &mut ProviderRequest) -> Result<(), GatewayError> {
        for message in &request.messages {
            let lowered = message.content.to_ascii_lowercase();
            if self.blocklist.iter().any(|phrase| lowered.contains(phrase)) {
                return Err(GatewayError::Guardrail {
                    reason: "blocked_phrase".to_string(),
                });
            }
        }
        let total: usize = request.messages.iter().map(|m| m.content.chars().count()).sum();
        if total <= self.config.max_prompt_chars {
            return Ok(());
        }
        match self.config.on_over_length {
            OverLengthAction::Reject => Err(GatewayError::Guardrail {
                reason: "prompt_too_long".to_string(),
            }),
            OverLengthAction::Truncate => {
                truncate_messages(request, self.config.max_prompt_chars);
                Ok(())
            }
        }
    }
}

/// Truncates message contents from the end until the total fits the budget.
fn truncate_messages(request: &mut ProviderRequest, budget: usize) {
    let mut used = 0;
    for message in &mut request.messages {
        let length = message.content.chars().count();
        if used + length <= budget {
            used += length;
            continue;
        }
        let keep = budget.saturating_sub(used);
        message.content = message.content.chars().take(keep).collect();
        used = budget;
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use deskflow_core::ChatMessage;
    use deskflow_core::GenerationParams;
    use deskflow_core::OutputFormat;

    use super::*;

    fn request(contents: &[&str]) -> ProviderRequest {
        ProviderRequest {
            model: "default".to_string(),
            messages: contents.iter().map(|content| ChatMessage::user(*content)).collect(),
            params: GenerationParams::default(),
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn blocked_phrase_is_rejected_case_insensitively() {
        let guardrails = Guardrails::new(GuardrailConfig {
            blocklist: vec!["drop table".to_string()],
            ..GuardrailConfig::default()
        });
        let mut req = request(&["please DROP TABLE users"]);
        let err = guardrails.apply(&mut req).unwrap_err();
        assert!(matches!(err, GatewayError::Guardrail { reason } if reason == "blocked_phrase"));
    }

    #[test]
    fn over_length_prompt_is_rejected_by_default() {
        let guardrails = Guardrails::new(GuardrailConfig {
            max_prompt_chars: 8,
            ..GuardrailConfig::default()
        });
        let mut req = request(&["this is far too long"]);
        let err = guardrails.apply(&mut req).unwrap_err();
        assert!(matches!(err, GatewayError::Guardrail { reason } if reason == "prompt_too_long"));
    }

    #[test]
    fn truncate_policy_trims_from_the_end() {
        let guardrails = Guardrails::new(GuardrailConfig {
            max_prompt_chars: 6,
            on_over_length: OverLengthAction::Truncate,
            ..GuardrailConfig::default()
        });
        let mut req = request(&["abcd", "efgh"]);
        guardrails.apply(&mut req).unwrap();
        assert_eq!(req.messages[0].content, "abcd");
        assert_eq!(req.messages[1].content, "ef");
    }

    #[test]
    fn within_budget_prompt_passes_unchanged() {
        let guardrails = Guardrails::new(GuardrailConfig::default());
        let mut req = request(&["short prompt"]);
        guardrails.apply(&mut req).unwrap();
        assert_eq!(req.messages[0].content, "short prompt");
    }
}
