use thiserror::Error;

/// Failures of the model side of a turn. Only `Configuration` is fatal.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Model timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures talking to the trading platform.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Failures of a tool invocation. Rendered back to the model as observation text.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool '{0}'. Use one of the listed tools.")]
    UnknownTool(String),

    #[error(
        "Missing required parameters for {tool}: {}. Ask the user for them before calling the tool again.",
        .missing.join(", ")
    )]
    MissingParameters { tool: String, missing: Vec<String> },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{0}")]
    Execution(String),

    #[error("Insufficient liquidity in this pair. Try another token or wait for more liquidity.")]
    InsufficientLiquidity,

    #[error("Platform request failed: {0}")]
    Backend(#[from] BackendError),
}

impl ToolError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Validation errors are raised before anything touches the platform.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ToolError::UnknownTool(_)
                | ToolError::MissingParameters { .. }
                | ToolError::InvalidParameter { .. }
        )
    }
}
