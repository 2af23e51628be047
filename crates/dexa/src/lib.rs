//! DEXA - a conversational trading assistant for SUI DEX tokens.
//!
//! A language model reasons in Thought / Action / Observation cycles and
//! calls platform tools (balances, positions, token search, trending pairs,
//! quick buy and sell) until it can answer. Each user's conversation is kept
//! in SQLite and replayed as context on the next turn.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use dexa::models::UserIdentity;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = dexa::load_config("config/dexa.toml")?;
//! let assistant = dexa::Assistant::from_config(&config)?;
//! let user = UserIdentity::new("2104920255", "harry", "Harry");
//! let reply = assistant.respond(&user, "what's trending?").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub use dexa_agents as agents;
pub use dexa_history as history;
pub use dexa_models as models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dexa_agents::{
    build_model, AgentLoop, CredentialProvider, HttpBackend, ModelClient,
    OrderConfirmationPoller, PromptFormatter, StaticCredential, ToolDispatcher, ToolRegistry,
    TradingBackend, IDENTITY_KEYS,
};
use dexa_history::{HistoryError, HistoryStore};
use dexa_models::config::DexaConfig;
use dexa_models::message::{Message, UserIdentity};
use dexa_models::order::PollBudget;

/// Read a TOML config file. Omitted fields take their defaults.
pub fn load_config(path: &str) -> anyhow::Result<DexaConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {path}"))
}

/// Build the agent against the live model and trading platform.
pub fn build_agent(config: &DexaConfig) -> anyhow::Result<AgentLoop> {
    let model = build_model(&config.model).context("Failed to build model client")?;
    let backend: Arc<dyn TradingBackend> = Arc::new(
        HttpBackend::new(config.platform.clone()).context("Failed to build platform client")?,
    );
    let credentials = Arc::new(StaticCredential::from_env(&config.platform.bearer_token_env));
    build_agent_with(config, model, backend, credentials)
}

/// Build the agent from explicit model and platform implementations.
///
/// The system prompt is validated here, so a template with unknown
/// placeholders fails at startup rather than on the first turn.
pub fn build_agent_with(
    config: &DexaConfig,
    model: Arc<dyn ModelClient>,
    backend: Arc<dyn TradingBackend>,
    credentials: Arc<dyn CredentialProvider>,
) -> anyhow::Result<AgentLoop> {
    let formatter = match &config.agent.system_prompt_path {
        Some(path) => PromptFormatter::from_path(path)?,
        None => PromptFormatter::default(),
    };
    formatter
        .validate(&IDENTITY_KEYS)
        .context("Invalid system prompt template")?;

    let poller = OrderConfirmationPoller::new(Arc::clone(&backend), PollBudget::from(&config.poller));
    let dispatcher = ToolDispatcher::new(
        Arc::new(ToolRegistry::default_catalog()),
        backend,
        credentials,
        poller,
        config.platform.explorer_tx_url.clone(),
    );

    Ok(AgentLoop::new(
        model,
        formatter,
        Arc::new(dispatcher),
        config.agent.max_iterations,
        Duration::from_secs(config.model.timeout_seconds),
    ))
}

/// An agent bound to a history store: one call per user message.
pub struct Assistant {
    agent: AgentLoop,
    store: HistoryStore,
    context_window: usize,
}

impl Assistant {
    pub fn new(agent: AgentLoop, store: HistoryStore, context_window: usize) -> Self {
        Self {
            agent,
            store,
            context_window,
        }
    }

    pub fn from_config(config: &DexaConfig) -> anyhow::Result<Self> {
        let agent = build_agent(config)?;
        let store = HistoryStore::from_config(&config.history)
            .with_context(|| format!("Failed to open history: {}", config.history.sqlite_path))?;
        Ok(Self::new(agent, store, config.history.context_window))
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Run one turn for `identity`.
    ///
    /// The session is locked from loading the transcript until the exchange
    /// is saved, so concurrent messages of one user are handled in order.
    pub async fn respond(&self, identity: &UserIdentity, message: &str) -> Result<String, HistoryError> {
        let session = self.store.begin(&identity.user_id).await;
        let transcript = session.transcript(self.context_window)?;

        let reply = self.agent.run(message, &transcript, identity).await;

        session.record(&[Message::user(message), Message::assistant(reply.as_str())])?;
        Ok(reply)
    }
}
