use serde::{Deserialize, Serialize};

/// Top-level configuration for DEXA.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DexaConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub platform: PlatformConfig,
    pub poller: PollerConfig,
    pub history: HistoryConfig,
}

/// Which kind of model client to build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    /// Any OpenAI-compatible `chat/completions` endpoint.
    #[default]
    OpenAi,
    /// The local `claude` CLI.
    ClaudeCli,
}

/// Configuration for the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    /// Base URL of the OpenAI-compatible API. Unused by the CLI provider.
    pub endpoint: String,
    pub api_path: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: Option<f32>,
    /// Upper bound on a single model call. A hung call otherwise blocks the whole turn.
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::OpenAi,
            model: "gemini-1.5-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_path: "/chat/completions".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: Some(0.7),
            timeout_seconds: 60,
        }
    }
}

/// Configuration for the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool calls allowed per turn before the loop gives up.
    pub max_iterations: usize,
    /// Optional file replacing the built-in system prompt template.
    pub system_prompt_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            system_prompt_path: None,
        }
    }
}

/// Endpoints and order settings of the trading platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    pub common_url: String,
    pub insight_url: String,
    pub orders_url: String,
    pub wallets_url: String,
    /// Prefix for transaction links; the tx hash is appended.
    pub explorer_tx_url: String,
    /// Slippage tolerance in percent sent with quick orders.
    pub slippage: u32,
    pub priority_fee: String,
    /// Maximum results returned by token search.
    pub search_limit: u32,
    pub request_timeout_seconds: u64,
    /// Environment variable holding the bearer token used for authenticated endpoints.
    pub bearer_token_env: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            common_url: "https://api.dextrade.bot".to_string(),
            insight_url: "https://api-insight.dextrade.bot".to_string(),
            orders_url: "https://api-orders.dextrade.bot".to_string(),
            wallets_url: "https://api-wallets.dextrade.bot".to_string(),
            explorer_tx_url: "https://suivision.xyz/txblock".to_string(),
            slippage: 40,
            priority_fee: "0".to_string(),
            search_limit: 3,
            request_timeout_seconds: 30,
            bearer_token_env: "DEXA_BEARER_TOKEN".to_string(),
        }
    }
}

/// Budget for waiting on order settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollerConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Configuration for the chat-history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub sqlite_path: String,
    /// Entries kept per session; older ones are deleted after each turn.
    pub retention: usize,
    /// Entries loaded into the transcript at the start of a turn.
    pub context_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/dexa_history.db".to_string(),
            retention: 50,
            context_window: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_dexa_config() {
        let config = DexaConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: DexaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[model]
provider = "claude_cli"
model = "claude-3-5-haiku-latest"
timeout_seconds = 45

[agent]
max_iterations = 4

[platform]
orders_url = "http://localhost:8080"
slippage = 25

[poller]
max_retries = 5
retry_delay_ms = 200

[history]
sqlite_path = "/tmp/history.db"
retention = 20
"#;

        let config: DexaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, ModelProvider::ClaudeCli);
        assert_eq!(config.model.timeout_seconds, 45);
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.platform.orders_url, "http://localhost:8080");
        assert_eq!(config.platform.slippage, 25);
        assert_eq!(config.poller.max_retries, 5);
        assert_eq!(config.history.retention, 20);
        // Omitted fields fall back to defaults
        assert_eq!(config.platform.common_url, "https://api.dextrade.bot");
        assert_eq!(config.history.context_window, 10);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: DexaConfig = toml::from_str("").unwrap();
        assert_eq!(config, DexaConfig::default());
    }
}
