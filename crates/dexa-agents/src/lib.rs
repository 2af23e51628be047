pub mod agent_loop;
pub mod backend;
pub mod claude_cli;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod model;
pub mod parser;
pub mod poller;
pub mod prompts;
pub mod tools;

pub mod test_support;

pub use agent_loop::{AgentLoop, TurnOutcome, TurnReport, REFUSAL};
pub use backend::{CredentialProvider, StaticCredential, TradingBackend};
pub use claude_cli::ClaudeCliModel;
pub use dispatcher::ToolDispatcher;
pub use error::{AgentError, BackendError, ToolError};
pub use http::HttpBackend;
pub use model::{build_model, ModelClient, OpenAiCompatClient};
pub use poller::OrderConfirmationPoller;
pub use prompts::{identity_context, PromptFormatter, IDENTITY_KEYS};
pub use tools::ToolRegistry;
