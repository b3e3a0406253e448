use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use super::gateway::{CallbackEvent, Checkout, CheckoutRequest, GatewayError, PaymentGateway};
use super::session::PaymentOutcome;
use crate::config::PaymentsConfig;
use crate::marketplace::domain::OrderId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SIGNATURE_FIELD: &str = "signature";
/// Debug echo of the signed string; Fondy excludes it from the digest.
const SIGNATURE_ECHO_FIELD: &str = "response_signature_string";

/// Hosted-checkout client for the Fondy payment API.
pub struct FondyGateway {
    client: reqwest::Client,
    config: PaymentsConfig,
}

impl FondyGateway {
    pub fn new(config: PaymentsConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    /// Signed parameter set sent to `{api}/checkout/url`.
    pub fn checkout_params(&self, request: &CheckoutRequest) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        params.insert("order_id".to_string(), json!(request.order_id.as_str()));
        params.insert("merchant_id".to_string(), json!(self.config.merchant_id));
        params.insert("amount".to_string(), json!(request.amount));
        params.insert("currency".to_string(), json!(self.config.currency));
        params.insert("order_desc".to_string(), json!(request.description));
        params.insert("response_url".to_string(), json!(self.config.response_url));
        params.insert(
            "server_callback_url".to_string(),
            json!(self.config.callback_url),
        );
        let signature = sign(&self.config.merchant_password, params.iter());
        params.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
        params
    }

    fn verify(&self, fields: &Map<String, Value>) -> Result<(), GatewayError> {
        let provided = fields
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .ok_or(GatewayError::InvalidSignature)?;
        let mut sorted: Vec<(&String, &Value)> = fields
            .iter()
            .filter(|(key, _)| {
                key.as_str() != SIGNATURE_FIELD && key.as_str() != SIGNATURE_ECHO_FIELD
            })
            .collect();
        sorted.sort_by(|left, right| left.0.cmp(right.0));
        let expected = sign(&self.config.merchant_password, sorted.into_iter());
        if expected.eq_ignore_ascii_case(provided) {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature)
        }
    }
}

/// Lowercase hex SHA-1 of `password|v1|v2|...` over non-empty values, taken in
/// the iterator's order (callers pass key-sorted pairs).
pub fn sign<'a>(password: &str, params: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let mut parts = vec![password.to_string()];
    parts.extend(params.filter_map(|(_, value)| signable(value)));
    let digest = Sha1::digest(parts.join("|").as_bytes());
    hex::encode(digest)
}

fn signable(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn outcome_for(status: &str) -> Option<PaymentOutcome> {
    match status {
        "approved" => Some(PaymentOutcome::Confirmed),
        "declined" | "expired" | "reversed" => Some(PaymentOutcome::Failed),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutEnvelope {
    response: CheckoutReply,
}

#[derive(Debug, Deserialize)]
struct CheckoutReply {
    response_status: String,
    checkout_url: Option<String>,
    error_message: Option<String>,
}

#[async_trait]
impl PaymentGateway for FondyGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<Checkout, GatewayError> {
        let params = self.checkout_params(&request);
        let url = format!("{}/checkout/url", self.config.api_url.trim_end_matches('/'));
        debug!(order_id = %request.order_id, %url, "requesting checkout url");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "request": params }))
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let envelope: CheckoutEnvelope = response
            .json()
            .await
            .map_err(|err| GatewayError::Protocol(err.to_string()))?;

        let reply = envelope.response;
        if reply.response_status != "success" {
            let message = reply
                .error_message
                .unwrap_or_else(|| "Payment initialization failed".to_string());
            warn!(order_id = %request.order_id, %message, "checkout rejected by provider");
            return Err(GatewayError::Rejected(message));
        }
        let checkout_url = reply
            .checkout_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::Protocol("missing checkout_url".to_string()))?;
        Ok(Checkout { checkout_url })
    }

    fn parse_callback(&self, payload: &Value) -> Result<CallbackEvent, GatewayError> {
        let body = payload.get("response").unwrap_or(payload);
        let fields = body
            .as_object()
            .ok_or_else(|| GatewayError::MalformedCallback("expected an object".to_string()))?;
        let order_id = fields
            .get("order_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::MalformedCallback("missing order_id".to_string()))?;

        self.verify(fields)?;

        let provider_status = fields
            .get("order_status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(CallbackEvent {
            order_id: OrderId::from(order_id),
            outcome: outcome_for(&provider_status),
            provider_status,
        })
    }
}
