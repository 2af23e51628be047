use std::sync::Arc;

use dexa_models::order::{OrderStatus, PollBudget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::TradingBackend;

/// Waits for a submitted order to settle, within a fixed retry budget.
pub struct OrderConfirmationPoller {
    backend: Arc<dyn TradingBackend>,
    budget: PollBudget,
    cancel: Option<CancellationToken>,
}

impl OrderConfirmationPoller {
    pub fn new(backend: Arc<dyn TradingBackend>, budget: PollBudget) -> Self {
        Self {
            backend,
            budget,
            cancel: None,
        }
    }

    /// Stop waiting early when `cancel` fires; the last known status is returned.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Poll until the order succeeds or the budget runs out.
    ///
    /// Returns the first `success` snapshot, else the last snapshot observed.
    /// Fetch errors count as attempts; if none succeeded the result is
    /// `unknown` carrying the last error.
    pub async fn poll(&self, bearer: &str, order_id: &str) -> OrderStatus {
        let mut last: Option<OrderStatus> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.budget.max_retries {
            if self.is_cancelled() {
                debug!(order_id, attempt, "Polling cancelled");
                break;
            }

            match self.backend.order_status(bearer, order_id).await {
                Ok(status) if status.is_settled() => {
                    info!(order_id, attempt, "Order settled");
                    return status;
                }
                Ok(status) => {
                    debug!(order_id, attempt, status = ?status.status, "Order not settled yet");
                    last = Some(status);
                }
                Err(e) => {
                    warn!(order_id, attempt, error = %e, "Order status fetch failed");
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.budget.max_retries && !self.wait().await {
                debug!(order_id, attempt, "Polling cancelled during wait");
                break;
            }
        }

        last.unwrap_or_else(|| {
            OrderStatus::unknown(format!(
                "Failed to get order status: {}",
                last_error.as_deref().unwrap_or("no attempt was made")
            ))
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for the retry delay. Returns false if cancelled first.
    async fn wait(&self) -> bool {
        match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => false,
                    _ = tokio::time::sleep(self.budget.retry_delay) => true,
                }
            }
            None => {
                tokio::time::sleep(self.budget.retry_delay).await;
                true
            }
        }
    }
}
