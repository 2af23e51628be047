//! Test doubles for driving the agent without a model or a platform.
//!
//! `ScriptedModel` replays canned completions in order and records every
//! prompt it receives. `MockBackend` serves fixed market data, scripts the
//! order-status sequence, and counts calls per endpoint so tests can assert
//! what was (or was not) touched.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dexa_models::market::{PeriodStats, Position, TokenSummary, TopPair, TrendingPair, Wallet};
use dexa_models::message::{Message, UserIdentity};
use dexa_models::order::{OrderRequest, OrderState, OrderStatus};
use rust_decimal::Decimal;

use crate::backend::TradingBackend;
use crate::error::{AgentError, BackendError};
use crate::model::ModelClient;

/// A model that answers with scripted completions, one per call.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue a model failure after the already-scripted replies.
    pub fn then_fail(self, message: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(message.to_string()));
        }
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, AgentError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| AgentError::Model("script lock poisoned".to_string()))?
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AgentError::Model(message)),
            None => Err(AgentError::Model("script exhausted".to_string())),
        }
    }
}

/// In-memory trading platform.
#[derive(Default)]
pub struct MockBackend {
    wallets: Vec<Wallet>,
    positions: Vec<Position>,
    search_results: Vec<TokenSummary>,
    trending: Vec<TrendingPair>,
    top_pairs: HashMap<String, TopPair>,
    order_ids: Vec<String>,
    statuses: Mutex<VecDeque<Result<OrderStatus, String>>>,
    submitted: Mutex<Vec<OrderRequest>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    requests: Mutex<Vec<(&'static str, String)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            order_ids: vec!["order-1".to_string()],
            ..Default::default()
        }
    }

    pub fn with_wallets(mut self, wallets: Vec<Wallet>) -> Self {
        self.wallets = wallets;
        self
    }

    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_search_results(mut self, tokens: Vec<TokenSummary>) -> Self {
        self.search_results = tokens;
        self
    }

    pub fn with_trending(mut self, pairs: Vec<TrendingPair>) -> Self {
        self.trending = pairs;
        self
    }

    pub fn with_top_pair(mut self, pair: TopPair) -> Self {
        self.top_pairs.insert(pair.token.address.clone(), pair);
        self
    }

    /// Ids returned by order submission. Empty simulates an unfilled order.
    pub fn with_order_ids(mut self, ids: Vec<String>) -> Self {
        self.order_ids = ids;
        self
    }

    /// Status responses in order. The last one repeats once the script runs out.
    pub fn with_statuses(self, statuses: Vec<Result<OrderStatus, String>>) -> Self {
        if let Ok(mut queue) = self.statuses.lock() {
            *queue = statuses.into();
        }
        self
    }

    /// Calls made to one endpoint, by trait method name.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .ok()
            .and_then(|c| c.get(endpoint).copied())
            .unwrap_or_default()
    }

    /// Calls made to any endpoint.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|c| c.values().sum())
            .unwrap_or_default()
    }

    /// Orders received by `submit_order`.
    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// `(endpoint, argument)` pairs, e.g. the resolution passed to `trending_pairs`.
    pub fn requests(&self) -> Vec<(&'static str, String)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, endpoint: &'static str, argument: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(endpoint).or_default() += 1;
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((endpoint, argument.into()));
        }
    }
}

#[async_trait]
impl TradingBackend for MockBackend {
    async fn wallets(&self, _bearer: &str) -> Result<Vec<Wallet>, BackendError> {
        self.record("wallets", "");
        Ok(self.wallets.clone())
    }

    async fn positions(&self, _bearer: &str) -> Result<Vec<Position>, BackendError> {
        self.record("positions", "");
        Ok(self.positions.clone())
    }

    async fn token_positions(
        &self,
        _bearer: &str,
        token_address: &str,
    ) -> Result<Vec<Position>, BackendError> {
        self.record("token_positions", token_address);
        Ok(self
            .positions
            .iter()
            .filter(|p| p.address == token_address)
            .cloned()
            .collect())
    }

    async fn search_tokens(&self, query: &str) -> Result<Vec<TokenSummary>, BackendError> {
        self.record("search_tokens", query);
        Ok(self.search_results.clone())
    }

    async fn trending_pairs(
        &self,
        resolution: &str,
        limit: usize,
    ) -> Result<Vec<TrendingPair>, BackendError> {
        self.record("trending_pairs", format!("{resolution}:{limit}"));
        Ok(self.trending.clone())
    }

    async fn top_pair(&self, token_address: &str) -> Result<Option<TopPair>, BackendError> {
        self.record("top_pair", token_address);
        Ok(self.top_pairs.get(token_address).cloned())
    }

    async fn submit_order(
        &self,
        _bearer: &str,
        order: &OrderRequest,
    ) -> Result<Vec<String>, BackendError> {
        self.record("submit_order", order.token_address.clone());
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(order.clone());
        }
        Ok(self.order_ids.clone())
    }

    async fn order_status(
        &self,
        _bearer: &str,
        order_id: &str,
    ) -> Result<OrderStatus, BackendError> {
        self.record("order_status", order_id);
        let next = {
            let mut queue = self
                .statuses
                .lock()
                .map_err(|_| BackendError::Decode("status script poisoned".to_string()))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        match next {
            Some(Ok(status)) => Ok(status),
            Some(Err(body)) => Err(BackendError::Status { status: 503, body }),
            None => Err(BackendError::Decode("no order status scripted".to_string())),
        }
    }
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_default()
}

/// A settled order snapshot.
pub fn settled(amount_in: &str, amount_out: &str) -> OrderStatus {
    OrderStatus {
        status: OrderState::Success,
        amount_in: Some(dec(amount_in)),
        amount_out: Some(dec(amount_out)),
        hash: Some("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string()),
        sell_percent: None,
        error: None,
    }
}

pub fn token(address: &str, symbol: &str, price_usd: &str) -> TokenSummary {
    TokenSummary {
        address: address.to_string(),
        name: symbol.to_string(),
        symbol: symbol.to_string(),
        price_usd: Some(dec(price_usd)),
    }
}

/// A top pair for `address` with flat stats.
pub fn top_pair(address: &str, symbol: &str) -> TopPair {
    TopPair {
        network: "sui".to_string(),
        pair_id: format!("pair-{symbol}"),
        dex_name: Some("Cetus".to_string()),
        token: token(address, symbol, "0.0125"),
        liquidity_usd: dec("52000"),
        market_cap_usd: dec("1250000"),
        stats: ["5m", "1h", "6h", "24h"]
            .iter()
            .map(|p| PeriodStats {
                period: p.to_string(),
                price_change: dec("1.5"),
                volume_usd: dec("2500"),
                buys: 12,
                sells: 7,
            })
            .collect(),
    }
}

pub fn wallet(address: &str, balance: &str) -> Wallet {
    Wallet {
        address: address.to_string(),
        name: None,
        balance: Some(dec(balance)),
    }
}

pub fn identity() -> UserIdentity {
    UserIdentity::new("2104920255", "harry", "Harry")
}
