//! Configuration loading and validation for Haven.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`HAVEN_API_KEY`, `HAVEN_MODEL`, `HAVEN_BASE_URL`).
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Session memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: "openai", "openrouter", or "ollama"
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key (override with HAVEN_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for chat replies
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Session store backend: "sqlite" or "memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Recency-window budget for the summarization buffer, in estimated
    /// tokens
    #[serde(default = "default_buffer_token_limit")]
    pub buffer_token_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Diary entries retrieved per message
    #[serde(default = "default_top_k")]
    pub diary_top_k: usize,

    /// Knowledge items retrieved per message
    #[serde(default = "default_top_k")]
    pub knowledge_top_k: usize,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_memory_backend() -> String {
    "sqlite".into()
}
fn default_db_path() -> String {
    "haven.db".into()
}
fn default_buffer_token_limit() -> usize {
    2000
}
fn default_top_k() -> usize {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: default_db_path(),
            buffer_token_limit: default_buffer_token_limit(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            diary_top_k: default_top_k(),
            knowledge_top_k: default_top_k(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides and validate. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `HAVEN_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("HAVEN_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("HAVEN_MODEL") {
            if !model.is_empty() {
                self.provider.model = model;
            }
        }
        if let Ok(url) = std::env::var("HAVEN_BASE_URL") {
            if !url.is_empty() {
                self.provider.api_url = Some(url);
            }
        }
    }

    /// Validate the configuration, rejecting values that would misbehave
    /// at runtime rather than failing loudly here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model must not be empty".into()));
        }
        if !matches!(self.provider.name.as_str(), "openai" | "openrouter" | "ollama") {
            return Err(ConfigError::Invalid(format!(
                "unknown provider.name: {}",
                self.provider.name
            )));
        }
        if !matches!(self.memory.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::Invalid(format!(
                "unknown memory.backend: {}",
                self.memory.backend
            )));
        }
        if self.memory.buffer_token_limit == 0 {
            return Err(ConfigError::Invalid(
                "memory.buffer_token_limit must be positive".into(),
            ));
        }
        if self.retrieval.diary_top_k == 0 || self.retrieval.knowledge_top_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval top-k values must be positive".into(),
            ));
        }
        Ok(())
    }
}
