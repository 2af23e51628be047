use std::time::Duration;

use async_trait::async_trait;
use dexa_models::message::{Message, Role};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::model::ModelClient;

/// A model backed by the local `claude` CLI in print mode.
///
/// The leading system message becomes `--system-prompt`; the rest of the
/// conversation is flattened into one role-labelled prompt.
#[derive(Debug, Clone)]
pub struct ClaudeCliModel {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliModel {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(45),
        }
    }
}

impl ClaudeCliModel {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ModelClient for ClaudeCliModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, AgentError> {
        let (system_prompt, prompt) = split_prompt(messages);
        debug!(model = %self.model, prompt_len = prompt.len(), "Invoking claude CLI");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("claude")
                .args([
                    "-p",
                    prompt.as_str(),
                    "--system-prompt",
                    system_prompt.as_str(),
                    "--model",
                    self.model.as_str(),
                    "--output-format",
                    "text",
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| AgentError::Model(format!("Failed to spawn claude: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
            return Err(AgentError::Model(format!(
                "claude exited {}: {}",
                output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(AgentError::Model("claude returned an empty response".to_string()));
        }
        Ok(stdout)
    }
}

/// System text and the flattened conversation.
fn split_prompt(messages: &[Message]) -> (String, String) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let conversation = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| match m.role {
            Role::Assistant => format!("Assistant: {}", m.content),
            _ => format!("User: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    (system, conversation)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model() {
        let model = ClaudeCliModel::default();
        assert_eq!(model.model, "claude-3-5-haiku-latest");
        assert_eq!(model.timeout, Duration::from_secs(45));
    }

    #[test]
    fn split_separates_system_prompt() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("Thought: greet\nAnswer: hello"),
            Message::user("Observation: 2 wallets"),
        ];
        let (system, prompt) = split_prompt(&messages);
        assert_eq!(system, "be brief");
        assert_eq!(
            prompt,
            "User: hi\n\nAssistant: Thought: greet\nAnswer: hello\n\nUser: Observation: 2 wallets"
        );
    }
}
