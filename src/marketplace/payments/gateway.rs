use async_trait::async_trait;
use serde_json::Value;

use super::session::PaymentOutcome;
use crate::marketplace::domain::OrderId;

/// What the marketplace asks the provider to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    /// Minor currency units.
    pub amount: u64,
    pub description: String,
}

/// Hosted payment page the client is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub checkout_url: String,
}

/// Parsed, authenticated provider callback. `outcome` is `None` while the
/// provider still reports the order as in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub order_id: OrderId,
    pub provider_status: String,
    pub outcome: Option<PaymentOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
    #[error("payment provider unreachable: {0}")]
    Transport(String),
    #[error("unexpected payment provider response: {0}")]
    Protocol(String),
    #[error("payment callback signature mismatch")]
    InvalidSignature,
    #[error("malformed payment callback: {0}")]
    MalformedCallback(String),
}

/// Checkout-redirect payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<Checkout, GatewayError>;

    fn parse_callback(&self, payload: &Value) -> Result<CallbackEvent, GatewayError>;
}
