use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::PollerConfig;

/// Settlement state reported by the order endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Pending,
    Success,
    Failed,
    /// No usable status: the field was missing, unrecognised, or the endpoint was unreachable.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Snapshot of an order as returned by `GET /orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    #[serde(default)]
    pub status: OrderState,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount_in: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount_out: Option<Decimal>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub sell_percent: Option<Decimal>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OrderStatus {
    /// Status used when no attempt produced a snapshot.
    pub fn unknown(error: impl Into<String>) -> Self {
        Self {
            status: OrderState::Unknown,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == OrderState::Success
    }
}

/// Accepts decimals encoded as JSON strings or numbers; blanks and garbage become `None`.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => parse_decimal(&s),
        Some(serde_json::Value::Number(n)) => parse_decimal(&n.to_string()),
        _ => None,
    })
}

/// Parse a platform decimal, accepting plain and scientific notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Direction of a quick-trade submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A quick-buy or quick-sell submission.
///
/// `amount` is the SUI to spend for a buy and the percentage of the holding
/// for a sell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub token_address: String,
    pub pair_id: String,
    pub wallet_address: String,
    pub amount: Decimal,
    /// Sent with the submission so a retried request is not executed twice.
    pub idempotency_key: String,
}

/// How long to wait for an order to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl PollBudget {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        PollBudget::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for PollBudget {
    fn from(config: &PollerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decode_success_snapshot() {
        let json = r#"{
            "status": "success",
            "amountIn": "1.5",
            "amountOut": 1234.25,
            "hash": "8fJx",
            "sellPercent": null
        }"#;
        let status: OrderStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, OrderState::Success);
        assert_eq!(status.amount_in, Some(dec!(1.5)));
        assert_eq!(status.amount_out, Some(dec!(1234.25)));
        assert_eq!(status.hash.as_deref(), Some("8fJx"));
        assert_eq!(status.sell_percent, None);
        assert!(status.is_settled());
    }

    #[test]
    fn unrecognised_status_is_unknown() {
        let status: OrderStatus = serde_json::from_str(r#"{"status": "queued"}"#).unwrap();
        assert_eq!(status.status, OrderState::Unknown);
    }

    #[test]
    fn missing_fields_default() {
        let status: OrderStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status.status, OrderState::Unknown);
        assert_eq!(status.amount_in, None);
        assert!(!status.is_settled());
    }

    #[test]
    fn garbage_amount_is_dropped() {
        let status: OrderStatus =
            serde_json::from_str(r#"{"status": "pending", "amountIn": ""}"#).unwrap();
        assert_eq!(status.status, OrderState::Pending);
        assert_eq!(status.amount_in, None);
    }

    #[test]
    fn scientific_amount_is_parsed() {
        let status: OrderStatus =
            serde_json::from_str(r#"{"status": "success", "amountOut": "8.5E-7"}"#).unwrap();
        assert_eq!(status.amount_out, Some(dec!(0.00000085)));
    }

    #[test]
    fn budget_from_config() {
        let budget = PollBudget::from(&PollerConfig {
            max_retries: 5,
            retry_delay_ms: 250,
        });
        assert_eq!(budget.max_retries, 5);
        assert_eq!(budget.retry_delay, Duration::from_millis(250));
    }
}
