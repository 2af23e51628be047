use std::time::Duration;

use async_trait::async_trait;
use dexa_models::config::PlatformConfig;
use dexa_models::market::{
    PeriodStats, Position, PriceChange, TokenSummary, TopPair, TrendingPair, Wallet, PERIODS,
};
use dexa_models::order::{parse_decimal, OrderRequest, OrderSide, OrderStatus};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::TradingBackend;
use crate::error::BackendError;

/// reqwest client for the platform's four API hosts.
pub struct HttpBackend {
    http: Client,
    config: PlatformConfig,
}

impl HttpBackend {
    pub fn new(config: PlatformConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self { http, config })
    }

    /// Join a base URL and a path.
    fn url(base: &str, path: &str) -> String {
        let base = base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Send and return the status with the raw body.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), BackendError> {
        let response = request
            .header("accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Send and decode a successful body.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        decode(&body)
    }
}

#[async_trait]
impl TradingBackend for HttpBackend {
    async fn wallets(&self, bearer: &str) -> Result<Vec<Wallet>, BackendError> {
        let url = Self::url(&self.config.wallets_url, "/api/v1/sui/user-wallets");
        let raw: Vec<RawWallet> = self.fetch(self.http.get(&url).bearer_auth(bearer)).await?;
        Ok(raw.into_iter().map(RawWallet::into_wallet).collect())
    }

    async fn positions(&self, bearer: &str) -> Result<Vec<Position>, BackendError> {
        let url = Self::url(&self.config.insight_url, "/sui/api/v1/my/positions");
        let raw: Docs<RawPosition> = self.fetch(self.http.get(&url).bearer_auth(bearer)).await?;
        Ok(raw.docs.into_iter().map(RawPosition::into_position).collect())
    }

    async fn token_positions(
        &self,
        bearer: &str,
        token_address: &str,
    ) -> Result<Vec<Position>, BackendError> {
        let url = Self::url(
            &self.config.insight_url,
            &format!("/sui/api/v1/my/positions/{token_address}"),
        );
        let raw: Docs<RawPosition> = self.fetch(self.http.get(&url).bearer_auth(bearer)).await?;
        Ok(raw.docs.into_iter().map(RawPosition::into_position).collect())
    }

    async fn search_tokens(&self, query: &str) -> Result<Vec<TokenSummary>, BackendError> {
        let url = Self::url(&self.config.common_url, "/api/v1/search");
        let limit = self.config.search_limit.to_string();
        let request = self
            .http
            .get(&url)
            .query(&[("search", query), ("page", "1"), ("limit", limit.as_str())]);
        let raw: Docs<RawSearchHit> = self.fetch(request).await?;
        Ok(raw
            .docs
            .into_iter()
            .map(|hit| hit.token_base.into_summary())
            .collect())
    }

    async fn trending_pairs(
        &self,
        resolution: &str,
        limit: usize,
    ) -> Result<Vec<TrendingPair>, BackendError> {
        let url = Self::url(&self.config.common_url, "/api/v1/sui/pairs/trending");
        let limit = limit.to_string();
        let request = self.http.get(&url).query(&[
            ("page", "1"),
            ("limit", limit.as_str()),
            ("resolution", resolution),
            ("network", "sui"),
        ]);
        let raw: Vec<RawPair> = self.fetch(request).await?;
        Ok(raw.into_iter().map(RawPair::into_trending).collect())
    }

    async fn top_pair(&self, token_address: &str) -> Result<Option<TopPair>, BackendError> {
        let url = Self::url(
            &self.config.common_url,
            &format!("/api/v1/sui/tokens/{token_address}/top-pair"),
        );
        let (status, body) = self.send(self.http.get(&url)).await?;

        // 404 is an unknown token, 502 a malformed address.
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_GATEWAY {
            debug!(token = %token_address, status = status.as_u16(), "No top pair");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Option<RawPair> = if body.trim().is_empty() {
            None
        } else {
            decode(&body)?
        };
        Ok(raw.map(RawPair::into_top_pair))
    }

    async fn submit_order(
        &self,
        bearer: &str,
        order: &OrderRequest,
    ) -> Result<Vec<String>, BackendError> {
        let (path, payload) = order_payload(order, &self.config)?;
        let url = Self::url(&self.config.orders_url, path);
        let request = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .header("Idempotency-Key", &order.idempotency_key)
            .json(&payload);

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let raw: Option<Vec<RawSubmission>> = if body.trim().is_empty() {
            None
        } else {
            decode(&body)?
        };
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.order.map(|o| o.id))
            .collect())
    }

    async fn order_status(
        &self,
        bearer: &str,
        order_id: &str,
    ) -> Result<OrderStatus, BackendError> {
        let url = Self::url(
            &self.config.orders_url,
            &format!("/api/v1/sui/orders/{order_id}"),
        );
        self.fetch(self.http.get(&url).bearer_auth(bearer)).await
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        BackendError::Decode(format!("{e} (body length={})", body.len()))
    })
}

/// Endpoint path and JSON body of a quick order.
fn order_payload(
    order: &OrderRequest,
    config: &PlatformConfig,
) -> Result<(&'static str, Value), BackendError> {
    let order_setting = serde_json::json!({
        "priorityFee": config.priority_fee,
        "slippage": config.slippage,
    });

    match order.side {
        OrderSide::Buy => Ok((
            "/api/v1/sui/orders/quick-buy",
            serde_json::json!({
                "buyAmount": order.amount.normalize().to_string(),
                "tokenAddress": order.token_address,
                "orderSetting": order_setting,
                "pairId": order.pair_id,
                "wallets": [order.wallet_address],
            }),
        )),
        OrderSide::Sell => {
            let percent = order.amount.to_f64().ok_or_else(|| {
                BackendError::Decode(format!("sell percent {} is not representable", order.amount))
            })?;
            Ok((
                "/api/v1/sui/orders/quick-sell",
                serde_json::json!({
                    "sellPercent": percent,
                    "tokenAddress": order.token_address,
                    "orderSetting": order_setting,
                    "pairId": order.pair_id,
                    "wallets": [order.wallet_address],
                }),
            ))
        }
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

fn count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn period<'a>(stats: &'a Value, group: &str, period: &str) -> &'a Value {
    &stats[group][period]
}

#[derive(Debug, Deserialize)]
struct Docs<T> {
    #[serde(default = "Vec::new")]
    docs: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWallet {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    balance: Value,
}

impl RawWallet {
    fn into_wallet(self) -> Wallet {
        Wallet {
            balance: decimal(&self.balance),
            address: self.address,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawToken {
    address: String,
    name: String,
    symbol: String,
    price_usd: Value,
}

impl RawToken {
    fn into_summary(self) -> TokenSummary {
        TokenSummary {
            price_usd: decimal(&self.price_usd),
            address: self.address,
            name: self.name,
            symbol: self.symbol,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    #[serde(default)]
    token: RawToken,
    #[serde(default)]
    balance: Value,
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    wallet_name: Option<String>,
}

impl RawPosition {
    fn into_position(self) -> Position {
        Position {
            symbol: self.token.symbol,
            name: self.token.name,
            address: self.token.address,
            balance: decimal(&self.balance),
            wallet_address: self.wallet_address.or(self.wallet_name).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchHit {
    #[serde(default)]
    token_base: RawToken,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawPair {
    network: String,
    pair_id: String,
    dex: Value,
    token_base: RawToken,
    liquidity_usd: Value,
    volume_usd: Value,
    market_cap_usd: Value,
    stats: Value,
}

impl RawPair {
    /// The DEX arrives either as a name or as an object with a `name` field.
    fn dex_name(&self) -> Option<String> {
        self.dex
            .as_str()
            .or_else(|| self.dex["name"].as_str())
            .map(str::to_string)
    }

    fn into_trending(self) -> TrendingPair {
        let change = |p: &str| decimal(period(&self.stats, "percent", p)).unwrap_or_default();
        let price_change = PriceChange {
            m5: change("5m"),
            h1: change("1h"),
            h6: change("6h"),
            h24: change("24h"),
        };
        TrendingPair {
            dex: self.dex_name(),
            liquidity_usd: decimal(&self.liquidity_usd).unwrap_or_default(),
            volume_usd: decimal(&self.volume_usd).unwrap_or_default(),
            price_change,
            pair_id: self.pair_id,
            token: self.token_base.into_summary(),
        }
    }

    fn into_top_pair(self) -> TopPair {
        let stats = PERIODS
            .iter()
            .map(|p| PeriodStats {
                period: p.to_string(),
                price_change: decimal(period(&self.stats, "percent", p)).unwrap_or_default(),
                volume_usd: decimal(period(&self.stats, "volume", p)).unwrap_or_default(),
                buys: count(period(&self.stats, "buyTxn", p)),
                sells: count(period(&self.stats, "sellTxn", p)),
            })
            .collect();
        TopPair {
            dex_name: self.dex_name(),
            liquidity_usd: decimal(&self.liquidity_usd).unwrap_or_default(),
            market_cap_usd: decimal(&self.market_cap_usd).unwrap_or_default(),
            stats,
            network: self.network,
            pair_id: self.pair_id,
            token: self.token_base.into_summary(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    #[serde(default)]
    order: Option<RawOrderRef>,
}

#[derive(Debug, Deserialize)]
struct RawOrderRef {
    id: String,
}
