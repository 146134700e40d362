// crates/deskflow-config/src/config.rs
// ============================================================================
// Module: Deskflow Configuration
// Description: Configuration loading and validation for Deskflow.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: deskflow-gateway, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: any field outside its
//! named limit is a [`ConfigError`] identifying the field, and the server
//! refuses to start. Config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use deskflow_gateway::GuardrailConfig;
use deskflow_gateway::RetryPolicy;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "deskflow.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "DESKFLOW_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of identity tokens.
pub(crate) const MAX_IDENTITY_TOKENS: usize = 64;
/// Maximum length of an identity token.
pub(crate) const MAX_IDENTITY_TOKEN_LENGTH: usize = 256;
/// Maximum number of roles bound to one identity token.
pub(crate) const MAX_ROLES_PER_TOKEN: usize = 32;
/// Maximum number of configured agents.
pub(crate) const MAX_AGENTS: usize = 64;
/// Maximum number of keyword planner rules.
pub(crate) const MAX_KEYWORD_RULES: usize = 128;
/// Maximum length of a keyword trigger phrase.
pub(crate) const MAX_TRIGGER_LENGTH: usize = 256;
/// Maximum number of retrieval documents.
pub(crate) const MAX_RETRIEVAL_DOCUMENTS: usize = 1024;
/// Maximum size of one retrieval document in bytes.
pub(crate) const MAX_DOCUMENT_BYTES: usize = 64 * 1024;
/// Maximum retrieval result count.
pub(crate) const MAX_RETRIEVAL_TOP_K: usize = 32;
/// Maximum provider retry attempts.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 10;
/// Maximum backoff delay cap in milliseconds.
pub(crate) const MAX_BACKOFF_DELAY_MS: u64 = 60_000;
/// Minimum per-attempt gateway timeout in milliseconds.
pub(crate) const MIN_ATTEMPT_TIMEOUT_MS: u64 = 100;
/// Maximum per-attempt gateway timeout in milliseconds.
pub(crate) const MAX_ATTEMPT_TIMEOUT_MS: u64 = 60_000;
/// Minimum end-to-end request deadline in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
/// Maximum end-to-end request deadline in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Maximum request body size in bytes.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 10 * 1024 * 1024;
/// Minimum per-tool handler timeout in milliseconds.
pub(crate) const MIN_TOOL_TIMEOUT_MS: u64 = 100;
/// Maximum per-tool handler timeout in milliseconds.
pub(crate) const MAX_TOOL_TIMEOUT_MS: u64 = 120_000;
/// Maximum audit queue capacity.
pub(crate) const MAX_AUDIT_QUEUE_CAPACITY: usize = 65_536;
/// Maximum number of guardrail blocklist entries.
pub(crate) const MAX_BLOCKLIST_ENTRIES: usize = 256;

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default end-to-end request deadline in milliseconds.
const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Default per-attempt gateway timeout in milliseconds.
const fn default_attempt_timeout_ms() -> u64 {
    10_000
}

/// Default retrieval result count.
const fn default_top_k() -> usize {
    4
}

/// Default audit queue capacity.
const fn default_audit_queue_capacity() -> usize {
    1_024
}

/// Default per-tool handler timeout in milliseconds.
const fn default_tool_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Deskflow runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeskflowConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity verification configuration.
    pub identity: IdentityConfig,
    /// Model gateway configuration.
    pub gateway: GatewayConfig,
    /// Planner configuration.
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Tool wiring configuration.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Retrieval corpus configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Agent profiles the server accepts requests for.
    pub agents: Vec<String>,
}

impl DeskflowConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.identity.validate()?;
        self.gateway.validate()?;
        self.planner.validate()?;
        self.tools.validate()?;
        self.retrieval.validate()?;
        self.audit.validate()?;
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid("agents must list at least one agent".to_string()));
        }
        if self.agents.len() > MAX_AGENTS {
            return Err(ConfigError::Invalid("agents exceeds max entries".to_string()));
        }
        for agent in &self.agents {
            if agent.trim().is_empty() {
                return Err(ConfigError::Invalid("agents entries must be non-empty".to_string()));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// End-to-end request deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Validates server limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be between 1 and the body size limit".to_string(),
            ));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(
                "server.request_timeout_ms outside allowed range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identity verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Static bearer-token table.
    pub tokens: Vec<IdentityToken>,
}

/// One bearer token binding a subject to roles.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityToken {
    /// Opaque bearer token value.
    pub token: String,
    /// Caller subject the token authenticates.
    pub subject: String,
    /// Roles granted to the subject.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl IdentityConfig {
    /// Validates the token table.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(ConfigError::Invalid(
                "identity.tokens must list at least one token".to_string(),
            ));
        }
        if self.tokens.len() > MAX_IDENTITY_TOKENS {
            return Err(ConfigError::Invalid("identity.tokens exceeds max entries".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.tokens {
            if entry.token.is_empty() || entry.token.len() > MAX_IDENTITY_TOKEN_LENGTH {
                return Err(ConfigError::Invalid(
                    "identity.tokens token outside allowed length".to_string(),
                ));
            }
            if entry.subject.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "identity.tokens subject must be non-empty".to_string(),
                ));
            }
            if entry.roles.len() > MAX_ROLES_PER_TOKEN {
                return Err(ConfigError::Invalid(
                    "identity.tokens roles exceeds max entries".to_string(),
                ));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(ConfigError::Invalid(
                    "identity.tokens contains a duplicate token".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Model gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Bearer token for the provider, when required.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Allow a cleartext http endpoint (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Retry policy for transient provider failures.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Prompt guardrail settings.
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

impl GatewayConfig {
    /// Validates gateway settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "gateway.endpoint must include http:// or https://".to_string(),
            ));
        }
        if endpoint.starts_with("http://") && !self.allow_http {
            return Err(ConfigError::Invalid(
                "gateway.endpoint uses http:// without allow_http".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.model must be non-empty".to_string()));
        }
        if !(MIN_ATTEMPT_TIMEOUT_MS..=MAX_ATTEMPT_TIMEOUT_MS).contains(&self.attempt_timeout_ms) {
            return Err(ConfigError::Invalid(
                "gateway.attempt_timeout_ms outside allowed range".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Invalid(
                "gateway.retry.max_attempts outside allowed range".to_string(),
            ));
        }
        if self.retry.base_delay_ms == 0 || self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "gateway.retry.base_delay_ms must be between 1 and max_delay_ms".to_string(),
            ));
        }
        if self.retry.max_delay_ms > MAX_BACKOFF_DELAY_MS {
            return Err(ConfigError::Invalid(
                "gateway.retry.max_delay_ms exceeds backoff cap".to_string(),
            ));
        }
        if self.guardrails.max_prompt_chars == 0 {
            return Err(ConfigError::Invalid(
                "gateway.guardrails.max_prompt_chars must be greater than zero".to_string(),
            ));
        }
        if self.guardrails.blocklist.len() > MAX_BLOCKLIST_ENTRIES {
            return Err(ConfigError::Invalid(
                "gateway.guardrails.blocklist exceeds max entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Planner configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlannerConfig {
    /// Keyword rules tried before the model-assisted tier.
    #[serde(default)]
    pub rules: Vec<KeywordRuleConfig>,
    /// Enables the model-assisted planning tier.
    #[serde(default)]
    pub use_model: bool,
}

/// One keyword planner rule.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRuleConfig {
    /// Trigger phrase matched case-insensitively against the input.
    pub trigger: String,
    /// Tool invoked when the trigger matches.
    pub tool: String,
    /// Argument template with `{input}` and `{rest}` placeholders.
    #[serde(default)]
    pub args: Value,
}

impl PlannerConfig {
    /// Validates planner rules.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.rules.len() > MAX_KEYWORD_RULES {
            return Err(ConfigError::Invalid("planner.rules exceeds max entries".to_string()));
        }
        for rule in &self.rules {
            if rule.trigger.trim().is_empty() || rule.trigger.len() > MAX_TRIGGER_LENGTH {
                return Err(ConfigError::Invalid(
                    "planner.rules trigger outside allowed length".to_string(),
                ));
            }
            if rule.tool.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "planner.rules tool must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Tool wiring configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    /// Ticket-service tool wiring.
    #[serde(default)]
    pub ticket_service: Option<TicketServiceConfig>,
}

/// Ticket-service tool wiring.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketServiceConfig {
    /// Ticket CRUD endpoint URL.
    pub endpoint: String,
    /// Allow a cleartext http endpoint (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// Handler timeout in milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
    /// Roles permitted to create tickets.
    pub required_roles: Vec<String>,
}

impl ToolsConfig {
    /// Validates tool wiring.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ticket) = &self.ticket_service {
            ticket.validate()?;
        }
        Ok(())
    }
}

impl TicketServiceConfig {
    /// Validates ticket-service wiring.
    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "tools.ticket_service.endpoint must include http:// or https://".to_string(),
            ));
        }
        if endpoint.starts_with("http://") && !self.allow_http {
            return Err(ConfigError::Invalid(
                "tools.ticket_service.endpoint uses http:// without allow_http".to_string(),
            ));
        }
        if !(MIN_TOOL_TIMEOUT_MS..=MAX_TOOL_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(
                "tools.ticket_service.timeout_ms outside allowed range".to_string(),
            ));
        }
        if self.required_roles.is_empty() {
            return Err(ConfigError::Invalid(
                "tools.ticket_service.required_roles must list at least one role".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retrieval corpus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Documents loaded into the in-memory retriever.
    #[serde(default)]
    pub documents: Vec<DocumentConfig>,
}

/// One retrieval document.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    /// Source label reported with matching chunks.
    pub source: String,
    /// Document text.
    pub text: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            documents: Vec::new(),
        }
    }
}

impl RetrievalConfig {
    /// Validates the retrieval corpus.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 || self.top_k > MAX_RETRIEVAL_TOP_K {
            return Err(ConfigError::Invalid(
                "retrieval.top_k outside allowed range".to_string(),
            ));
        }
        if self.documents.len() > MAX_RETRIEVAL_DOCUMENTS {
            return Err(ConfigError::Invalid(
                "retrieval.documents exceeds max entries".to_string(),
            ));
        }
        for document in &self.documents {
            if document.source.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "retrieval.documents source must be non-empty".to_string(),
                ));
            }
            if document.text.is_empty() || document.text.len() > MAX_DOCUMENT_BYTES {
                return Err(ConfigError::Invalid(
                    "retrieval.documents text outside allowed size".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines to stderr.
    #[default]
    Stderr,
    /// Append-only JSONL file.
    File,
    /// Discard all events.
    Noop,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Bounded publisher queue capacity.
    #[serde(default = "default_audit_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Stderr,
            path: None,
            queue_capacity: default_audit_queue_capacity(),
        }
    }
}

impl AuditConfig {
    /// Validates audit sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sink == AuditSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid(
                "audit.path must be set for the file sink".to_string(),
            ));
        }
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        if self.queue_capacity == 0 || self.queue_capacity > MAX_AUDIT_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(
                "audit.queue_capacity outside allowed range".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
