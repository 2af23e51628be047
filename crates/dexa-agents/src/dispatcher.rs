use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use dexa_models::market::{Position, TopPair, TrendingPair, PERIODS};
use dexa_models::message::UserIdentity;
use dexa_models::order::{parse_decimal, OrderRequest, OrderSide, OrderState, OrderStatus};
use dexa_models::tool::ToolDescriptor;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{CredentialProvider, TradingBackend};
use crate::error::ToolError;
use crate::poller::OrderConfirmationPoller;
use crate::tools::{self, ToolRegistry};

pub const DEFAULT_TRENDING_LIMIT: usize = 5;
pub const MAX_TRENDING_LIMIT: usize = 10;
pub const DEFAULT_RESOLUTION: &str = "24h";

/// Runs the tool the model asked for and turns the outcome into observation text.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn TradingBackend>,
    credentials: Arc<dyn CredentialProvider>,
    poller: OrderConfirmationPoller,
    explorer_tx_url: String,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn TradingBackend>,
        credentials: Arc<dyn CredentialProvider>,
        poller: OrderConfirmationPoller,
        explorer_tx_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            backend,
            credentials,
            poller,
            explorer_tx_url: explorer_tx_url.into(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool call.
    ///
    /// Unknown tools and missing or malformed parameters are rejected before
    /// the platform is contacted.
    pub async fn invoke(
        &self,
        identity: &UserIdentity,
        name: &str,
        input: &BTreeMap<String, String>,
    ) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.trim().to_string()))?;
        check_required(tool, input)?;

        info!(tool = %tool.name, user_id = %identity.user_id, "Invoking tool");

        let result = match tool.name.as_str() {
            tools::GET_WALLET_BALANCE => self.wallet_balance(identity).await,
            tools::GET_ALL_POSITIONS => self.all_positions(identity).await,
            tools::GET_TOKEN_POSITIONS => {
                self.token_positions(identity, param(input, "token_address"))
                    .await
            }
            tools::SEARCH_TOKEN => self.search_token(param(input, "query")).await,
            tools::SCAN_TOKEN => self.scan_token(param(input, "token_address")).await,
            tools::GET_TRENDING_PAIRS => self.trending_pairs(input).await,
            tools::BUY_TOKEN => {
                let amount = parse_amount(param(input, "amount"))?;
                self.trade(identity, OrderSide::Buy, input, amount).await
            }
            tools::SELL_TOKEN => {
                let percent = parse_percent(param(input, "percent"))?;
                self.trade(identity, OrderSide::Sell, input, percent).await
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        if let Err(e) = &result {
            warn!(tool = %tool.name, error = %e, "Tool failed");
        }
        result
    }

    async fn wallet_balance(&self, identity: &UserIdentity) -> Result<String, ToolError> {
        let bearer = self.credentials.bearer(identity)?;
        let wallets = self.backend.wallets(&bearer).await?;
        if wallets.is_empty() {
            return Ok("No wallets found for this user.".to_string());
        }

        let mut out = format!("{} wallet(s):\n", wallets.len());
        for w in &wallets {
            let name = w.name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default();
            let _ = writeln!(out, "- {}{}: {} SUI", w.address, name, fmt_amount(w.balance));
        }
        Ok(out.trim_end().to_string())
    }

    async fn all_positions(&self, identity: &UserIdentity) -> Result<String, ToolError> {
        let bearer = self.credentials.bearer(identity)?;
        let positions = self.backend.positions(&bearer).await?;
        Ok(render_positions(&positions, "No token positions found in the user's wallets."))
    }

    async fn token_positions(
        &self,
        identity: &UserIdentity,
        token_address: &str,
    ) -> Result<String, ToolError> {
        let bearer = self.credentials.bearer(identity)?;
        let positions = self.backend.token_positions(&bearer, token_address).await?;
        Ok(render_positions(
            &positions,
            &format!("The user holds no {token_address} in any wallet."),
        ))
    }

    async fn search_token(&self, query: &str) -> Result<String, ToolError> {
        let tokens = self.backend.search_tokens(query).await?;
        if tokens.is_empty() {
            return Ok(format!("No tokens found matching '{query}'."));
        }

        let mut out = format!("Tokens matching '{query}':\n");
        for t in &tokens {
            let _ = writeln!(
                out,
                "- {} ({}) address: {} price: ${}",
                t.symbol,
                t.name,
                t.address,
                fmt_amount(t.price_usd)
            );
        }
        Ok(out.trim_end().to_string())
    }

    async fn scan_token(&self, token_address: &str) -> Result<String, ToolError> {
        match self.backend.top_pair(token_address).await? {
            Some(pair) => Ok(render_scan(&pair)),
            None => Ok(format!("No trading pair found for token {token_address}.")),
        }
    }

    async fn trending_pairs(&self, input: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let resolution = normalize_resolution(input.get("resolution").map(String::as_str));
        let limit = clamp_limit(input.get("limit").map(String::as_str));

        let mut pairs = self.backend.trending_pairs(resolution, limit).await?;
        pairs.sort_by(|a, b| b.liquidity_usd.cmp(&a.liquidity_usd));
        pairs.truncate(limit);

        if pairs.is_empty() {
            return Ok(format!("No trending pairs for the last {resolution}."));
        }

        let mut out = format!("Top {} trending pairs ({resolution}) by liquidity:\n", pairs.len());
        for pair in &pairs {
            out.push_str(&render_trending(pair));
        }
        Ok(out.trim_end().to_string())
    }

    async fn trade(
        &self,
        identity: &UserIdentity,
        side: OrderSide,
        input: &BTreeMap<String, String>,
        amount: Decimal,
    ) -> Result<String, ToolError> {
        let token_address = param(input, "token_address");
        let wallet_address = param(input, "wallet_address");
        let bearer = self.credentials.bearer(identity)?;

        let pair = self.backend.top_pair(token_address).await?.ok_or_else(|| {
            ToolError::Execution(format!(
                "Failed to fetch top pair information for {token_address}. Please try again later."
            ))
        })?;

        let order = OrderRequest {
            side,
            token_address: token_address.to_string(),
            pair_id: pair.pair_id,
            wallet_address: wallet_address.to_string(),
            amount,
            idempotency_key: Uuid::new_v4().to_string(),
        };

        let order_ids = self.backend.submit_order(&bearer, &order).await?;
        let order_id = order_ids
            .into_iter()
            .next()
            .ok_or(ToolError::InsufficientLiquidity)?;

        info!(
            order_id = %order_id,
            side = ?side,
            token = %token_address,
            amount = %amount,
            "Order submitted, waiting for settlement"
        );

        let status = self.poller.poll(&bearer, &order_id).await;
        Ok(render_trade(&order, &order_id, &status, &self.explorer_tx_url))
    }
}

fn check_required(tool: &ToolDescriptor, input: &BTreeMap<String, String>) -> Result<(), ToolError> {
    let missing: Vec<String> = tool
        .required
        .iter()
        .filter(|r| input.get(*r).is_none_or(|v| v.trim().is_empty()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::MissingParameters {
            tool: tool.name.clone(),
            missing,
        })
    }
}

/// A required parameter; presence was checked by `check_required`.
fn param<'a>(input: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    input.get(key).map_or("", |v| v.trim())
}

fn parse_amount(raw: &str) -> Result<Decimal, ToolError> {
    let amount = parse_decimal(raw)
        .ok_or_else(|| ToolError::invalid("amount", format!("'{raw}' is not a number")))?;
    if amount <= Decimal::ZERO {
        return Err(ToolError::invalid("amount", "must be greater than 0"));
    }
    Ok(amount)
}

fn parse_percent(raw: &str) -> Result<Decimal, ToolError> {
    let trimmed = raw.trim().trim_end_matches('%');
    let percent = parse_decimal(trimmed)
        .ok_or_else(|| ToolError::invalid("percent", format!("'{raw}' is not a number")))?;
    if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(ToolError::invalid(
            "percent",
            format!("must be between 0 and 100, got {percent}"),
        ));
    }
    Ok(percent)
}

fn normalize_resolution(raw: Option<&str>) -> &'static str {
    let raw = raw.map(str::trim).unwrap_or_default();
    PERIODS
        .iter()
        .find(|p| p.eq_ignore_ascii_case(raw))
        .copied()
        .unwrap_or(DEFAULT_RESOLUTION)
}

fn clamp_limit(raw: Option<&str>) -> usize {
    match raw.and_then(parse_decimal) {
        Some(limit) if limit < Decimal::ONE => 1,
        Some(limit) if limit > Decimal::from(MAX_TRENDING_LIMIT) => MAX_TRENDING_LIMIT,
        Some(limit) => limit.trunc().to_string().parse().unwrap_or(DEFAULT_TRENDING_LIMIT),
        None => DEFAULT_TRENDING_LIMIT,
    }
}

fn fmt_amount(value: Option<Decimal>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.normalize().to_string())
}

fn render_positions(positions: &[Position], empty: &str) -> String {
    if positions.is_empty() {
        return empty.to_string();
    }
    let mut out = format!("{} position(s):\n", positions.len());
    for p in positions {
        let _ = writeln!(
            out,
            "- {} ({}) address: {} balance: {} wallet: {}",
            p.symbol,
            p.name,
            p.address,
            fmt_amount(p.balance),
            p.wallet_address
        );
    }
    out.trim_end().to_string()
}

fn render_trending(pair: &TrendingPair) -> String {
    let c = &pair.price_change;
    format!(
        "## {} | ${}\n`{}`\nChanges: 5m: {:.2}% | 1h: {:.2}% | 6h: {:.2}% | 24h: {:.2}%\n\
         Liquidity: ${:.2} | Volume: ${:.2}\n\n",
        pair.token.symbol,
        fmt_amount(pair.token.price_usd),
        pair.token.address,
        c.m5,
        c.h1,
        c.h6,
        c.h24,
        pair.liquidity_usd,
        pair.volume_usd,
    )
}

fn render_scan(pair: &TopPair) -> String {
    let token = &pair.token;
    let mut out = format!("**{} ({})**\n`{}`\n\n", token.name, token.symbol, token.address);
    let _ = writeln!(
        out,
        "**Platform:** {} | **MCap:** ${:.2} | **Liq:** ${:.2}",
        pair.dex_name.as_deref().unwrap_or("unknown"),
        pair.market_cap_usd,
        pair.liquidity_usd
    );
    let _ = writeln!(out, "**Current Price:** ${}\n", fmt_amount(token.price_usd));
    out.push_str("| Time | Price | Volume | Buy/Sell |\n");
    out.push_str("|------|-------|--------|----------|\n");
    for s in &pair.stats {
        let _ = writeln!(
            out,
            "| {} | {:.2}% | ${:.2} | {}/{} |",
            s.period.to_uppercase(),
            s.price_change,
            s.volume_usd,
            s.buys,
            s.sells
        );
    }
    out.trim_end().to_string()
}

fn render_trade(order: &OrderRequest, order_id: &str, status: &OrderStatus, explorer: &str) -> String {
    let verb = match order.side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    };

    match status.status {
        OrderState::Success => {
            let mut out = match order.side {
                OrderSide::Buy => format!(
                    "Purchase successful:\nSpent: {} SUI\nReceived: {} tokens\nTo wallet: {}",
                    fmt_amount(status.amount_in),
                    fmt_amount(status.amount_out),
                    order.wallet_address
                ),
                OrderSide::Sell => format!(
                    "Sale successful:\nSold: {} tokens\nReceived: {} SUI\nPercentage: {}%\nFrom wallet: {}",
                    fmt_amount(status.amount_in),
                    fmt_amount(status.amount_out),
                    fmt_amount(status.sell_percent.or(Some(order.amount))),
                    order.wallet_address
                ),
            };
            if let Some(hash) = &status.hash {
                let _ = write!(out, "\nTransaction: {}/{hash}", explorer.trim_end_matches('/'));
            }
            out
        }
        OrderState::Failed => format!(
            "The {verb} order {order_id} failed: {}.",
            status.error.as_deref().unwrap_or("the platform gave no reason")
        ),
        OrderState::Pending | OrderState::Unknown => {
            let mut out = format!(
                "The {verb} order {order_id} was submitted but is not confirmed yet (status: {}). \
                 It may still settle; do not retry it. Ask the user to check their positions shortly.",
                match status.status {
                    OrderState::Pending => "pending",
                    _ => "unknown",
                }
            );
            if let Some(error) = &status.error {
                let _ = write!(out, " Detail: {error}");
            }
            out
        }
    }
}
