use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dexa_models::config::{ModelConfig, ModelProvider};
use dexa_models::message::Message;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::claude_cli::ClaudeCliModel;
use crate::error::AgentError;

/// A language model that continues a conversation. Mockable for testing.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, messages: &[Message]) -> Result<String, AgentError>;
}

/// Build the model client selected by configuration.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, AgentError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    match config.provider {
        ModelProvider::OpenAi => Ok(Arc::new(OpenAiCompatClient::from_config(config)?)),
        ModelProvider::ClaudeCli => Ok(Arc::new(ClaudeCliModel::new(&config.model, timeout))),
    }
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiCompatClient {
    http: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &ModelConfig) -> Result<Self, AgentError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(var = %config.api_key_env, "Model API key not set, sending unauthenticated requests");
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::Configuration(format!("cannot build HTTP client: {e}")))?;

        let base = config.endpoint.trim_end_matches('/');
        let path = config.api_path.trim_start_matches('/');

        Ok(Self {
            http,
            url: format!("{base}/{path}"),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, AgentError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
            stream: false,
        };

        info!(model = %self.model, messages = messages.len(), "Sending chat completion request");

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Model(format!("reading response failed: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::Model(format!("model endpoint returned {status}: {body}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        debug!(model = %self.model, "Received chat completion");

        first_content(parsed).ok_or_else(|| AgentError::Model("response has no content".to_string()))
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_from_endpoint_and_path() {
        let config = ModelConfig {
            endpoint: "http://localhost:11434/v1/".to_string(),
            api_path: "/chat/completions".to_string(),
            api_key_env: "DEXA_TEST_UNSET_MODEL_KEY".to_string(),
            ..ModelConfig::default()
        };
        let client = OpenAiCompatClient::from_config(&config).unwrap();
        assert_eq!(client.url, "http://localhost:11434/v1/chat/completions");
        assert!(client.api_key.is_none());
        assert_eq!(client.name(), "gemini-1.5-pro");
    }

    #[test]
    fn request_serializes_roles() {
        let messages = [Message::system("sys"), Message::user("hi")];
        let payload = ChatRequest {
            model: "m",
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: None,
            stream: false,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn content_from_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "Thought: hi\nAnswer: hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(response).unwrap(), "Thought: hi\nAnswer: hello");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_content(empty).is_none());
    }

    #[test]
    fn build_selects_provider() {
        let config = ModelConfig {
            provider: ModelProvider::ClaudeCli,
            model: "claude-3-5-haiku-latest".to_string(),
            ..ModelConfig::default()
        };
        let model = build_model(&config).unwrap();
        assert_eq!(model.name(), "claude-3-5-haiku-latest");
    }
}
