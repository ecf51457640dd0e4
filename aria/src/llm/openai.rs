//! OpenAI-compatible chat-completions provider
//!
//! One request shape serves OpenAI, Mistral and OpenRouter; the dialect only
//! picks the default endpoint. The request timeout is set once on the client,
//! so no call can hang past `timeout_seconds`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmConfig, LlmError, LlmProvider, LlmProviderInfo};

pub struct OpenAiCompatProvider {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.config.provider.default_base_url());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    async fn make_request(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let url = self.endpoint();
        let request_body = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, %url, "Sending chat completion request");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let body = if raw_body.len() > 1000 {
                format!("{}... [truncated, {} chars]", &raw_body[..1000], raw_body.len())
            } else {
                raw_body
            };
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&raw_body).map_err(|e| LlmError::Parse(e.to_string()))?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        Ok(choice.message.content.trim().to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.make_request(messages).await
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: format!("{:?} chat-completions provider", self.config.provider),
            model: self.config.model.clone(),
        }
    }
}

// Chat-completions wire types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
