use async_trait::async_trait;
use dexa_models::market::{Position, TokenSummary, TopPair, TrendingPair, Wallet};
use dexa_models::message::UserIdentity;
use dexa_models::order::{OrderRequest, OrderStatus};

use crate::error::{BackendError, ToolError};

/// The trading platform as seen by the tools. Mockable for testing.
#[async_trait]
pub trait TradingBackend: Send + Sync {
    async fn wallets(&self, bearer: &str) -> Result<Vec<Wallet>, BackendError>;

    async fn positions(&self, bearer: &str) -> Result<Vec<Position>, BackendError>;

    async fn token_positions(
        &self,
        bearer: &str,
        token_address: &str,
    ) -> Result<Vec<Position>, BackendError>;

    async fn search_tokens(&self, query: &str) -> Result<Vec<TokenSummary>, BackendError>;

    /// Trending pairs for `resolution`, in the platform's order.
    async fn trending_pairs(
        &self,
        resolution: &str,
        limit: usize,
    ) -> Result<Vec<TrendingPair>, BackendError>;

    /// The most liquid pair of a token, or `None` if the platform does not know it.
    async fn top_pair(&self, token_address: &str) -> Result<Option<TopPair>, BackendError>;

    /// Submit a quick order. Returns the order ids created; empty means nothing was filled.
    async fn submit_order(
        &self,
        bearer: &str,
        order: &OrderRequest,
    ) -> Result<Vec<String>, BackendError>;

    async fn order_status(&self, bearer: &str, order_id: &str)
        -> Result<OrderStatus, BackendError>;
}

/// Supplies the bearer token for a user's authenticated platform calls.
pub trait CredentialProvider: Send + Sync {
    fn bearer(&self, identity: &UserIdentity) -> Result<String, ToolError>;
}

/// Hands out one pre-issued token regardless of user.
pub struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Read the token from an environment variable. A missing variable surfaces on first use.
    pub fn from_env(var: &str) -> Self {
        Self {
            token: std::env::var(var).ok().filter(|t| !t.trim().is_empty()),
        }
    }
}

impl CredentialProvider for StaticCredential {
    fn bearer(&self, _identity: &UserIdentity) -> Result<String, ToolError> {
        self.token.clone().ok_or_else(|| {
            ToolError::Execution(
                "No platform credential is configured, so account tools are unavailable."
                    .to_string(),
            )
        })
    }
}
