// crates/deskflow-core/src/core/chat.rs
// ============================================================================
// Module: Provider Chat Model
// Description: Message, parameter, and response types for model providers.
// Purpose: Provide the wire-neutral request/response shapes the gateway routes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Provider requests carry a message list plus generation parameters and are
//! consumed by the model gateway. They are scoped to one provider call and
//! never persisted: secrets and raw prompts stay out of the dialogue store
//! and the audit stream (digests only).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Role of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// End-user input.
    User,
    /// Prior model output.
    Assistant,
}

/// One chat message in a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// SECTION: Generation Parameters
// ============================================================================

/// Generation parameters for one provider call.
///
/// # Invariants
/// - `max_tokens` is always bounded by configuration validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum completion tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

/// Expected shape of the provider completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free-form text completion.
    #[default]
    Text,
    /// Completion must parse as a single JSON value.
    Json,
}

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// Request routed to a model provider by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Provider-specific model identifier.
    pub model: String,
    /// Ordered message list.
    pub messages: Vec<ChatMessage>,
    /// Generation parameters.
    pub params: GenerationParams,
    /// Expected completion shape.
    pub format: OutputFormat,
}

/// Token accounting reported by a provider when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced in the completion.
    pub completion_tokens: u32,
}

/// Response returned by a model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Completion text.
    pub content: String,
    /// Token usage when the provider reports it.
    pub usage: Option<TokenUsage>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use super::*;

    #[test]
    fn roles_serialize_as_snake_case() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn message_helpers_set_roles() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
    }
}
