pub mod config;
pub mod history;
pub mod market;
pub mod message;
pub mod order;
pub mod reasoning;
pub mod tool;

pub use config::{
    AgentConfig, DexaConfig, HistoryConfig, ModelConfig, ModelProvider, PlatformConfig,
    PollerConfig,
};
pub use history::{HistoryEntry, HISTORY_TABLE_DDL};
pub use market::{PeriodStats, Position, PriceChange, TokenSummary, TopPair, TrendingPair, Wallet};
pub use message::{Message, Role, UserIdentity};
pub use order::{OrderRequest, OrderSide, OrderState, OrderStatus, PollBudget};
pub use reasoning::{ReasoningStep, ScratchpadEntry, IMPLICIT_THOUGHT};
pub use tool::ToolDescriptor;
