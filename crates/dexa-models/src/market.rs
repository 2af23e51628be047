use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A wallet owned by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub address: String,
    pub name: Option<String>,
    /// SUI balance.
    pub balance: Option<Decimal>,
}

/// A token holding in one of the user's wallets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub name: String,
    pub address: String,
    pub balance: Option<Decimal>,
    pub wallet_address: String,
}

/// Basic token facts used by search results and pair listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TokenSummary {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<Decimal>,
}

/// Percentage price changes over the standard windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PriceChange {
    pub m5: Decimal,
    pub h1: Decimal,
    pub h6: Decimal,
    pub h24: Decimal,
}

/// A pair from the trending listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingPair {
    pub pair_id: String,
    pub dex: Option<String>,
    pub token: TokenSummary,
    pub liquidity_usd: Decimal,
    pub volume_usd: Decimal,
    pub price_change: PriceChange,
}

/// Trading activity of a pair over one window (`5m`, `1h`, `6h`, `24h`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodStats {
    pub period: String,
    pub price_change: Decimal,
    pub volume_usd: Decimal,
    pub buys: u64,
    pub sells: u64,
}

/// The most liquid pair for a token; trades are routed through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopPair {
    pub network: String,
    pub pair_id: String,
    pub dex_name: Option<String>,
    pub token: TokenSummary,
    pub liquidity_usd: Decimal,
    pub market_cap_usd: Decimal,
    pub stats: Vec<PeriodStats>,
}

/// Windows reported for trending pairs and token scans.
pub const PERIODS: [&str; 4] = ["5m", "1h", "6h", "24h"];
