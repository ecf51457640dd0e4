//! Language-model service interface
//!
//! The model is a black box that turns a prompt into text which may or may
//! not obey formatting instructions; everything downstream treats the reply
//! as untrusted. Providers speak the OpenAI-compatible chat-completions
//! dialect, which also covers Mistral and OpenRouter via `base_url`.

mod openai;

pub use openai::OpenAiCompatProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error type for model requests
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not found in environment variable: {0}")]
    MissingApiKey(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("LLM API request failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    Parse(String),

    #[error("LLM returned no choices")]
    EmptyResponse,
}

/// Configuration for the model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_model() -> String {
    "ministral-8b-latest".to_string()
}

fn default_api_key_env() -> String {
    "MISTRAL_API_KEY".to_string()
}

fn default_max_tokens() -> Option<u32> {
    Some(2048)
}

fn default_temperature() -> Option<f64> {
    Some(0.7)
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Supported provider dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// api.mistral.ai, OpenAI-compatible
    #[default]
    Mistral,
    OpenAi,
    OpenRouter,
    /// Deterministic canned responses, for tests
    Stub,
}

impl LlmProviderKind {
    /// Default endpoint for the dialect when `base_url` is not set
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProviderKind::Mistral => "https://api.mistral.ai/v1",
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
            LlmProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProviderKind::Stub => "",
        }
    }
}

/// Abstract interface to the model service
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text from a prompt
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Provider information for logging
    fn info(&self) -> LlmProviderInfo;
}

/// Information about a provider instance
#[derive(Debug, Clone)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

/// Build a provider from configuration, resolving the API key from the
/// environment for network-backed providers.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider {
        LlmProviderKind::Stub => Ok(Arc::new(StubLlmProvider::default())),
        _ => {
            let api_key = std::env::var(&config.api_key_env)
                .map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;
            Ok(Arc::new(OpenAiCompatProvider::new(config.clone(), api_key)?))
        }
    }
}

/// Deterministic provider for tests: replays queued responses, then a
/// fixed fallback line.
pub struct StubLlmProvider {
    responses: Mutex<VecDeque<String>>,
}

impl Default for StubLlmProvider {
    fn default() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }
}

impl StubLlmProvider {
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn generate_text(&self, _prompt: &str) -> Result<String, LlmError> {
        let mut queue = self.responses.lock().expect("stub response queue poisoned");
        Ok(queue
            .pop_front()
            .unwrap_or_else(|| "I'm a stub response.".to_string()))
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "Stub LLM Provider".to_string(),
            model: "stub".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_replays_then_falls_back() {
        let stub = StubLlmProvider::with_responses(["one", "two"]);
        assert_eq!(stub.generate_text("x").await.unwrap(), "one");
        assert_eq!(stub.generate_text("x").await.unwrap(), "two");
        assert_eq!(stub.generate_text("x").await.unwrap(), "I'm a stub response.");
    }

    #[test]
    fn test_factory_requires_api_key() {
        let config = LlmConfig {
            api_key_env: "ARIA_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
            ..Default::default()
        };
        match create_provider(&config) {
            Err(LlmError::MissingApiKey(var)) => {
                assert_eq!(var, "ARIA_TEST_KEY_THAT_DOES_NOT_EXIST")
            }
            other => panic!("unexpected: {:?}", other.map(|p| p.info())),
        }
    }

    #[test]
    fn test_stub_needs_no_key() {
        let config = LlmConfig {
            provider: LlmProviderKind::Stub,
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.info().model, "stub");
    }
}
