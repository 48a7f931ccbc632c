//! Payment provider gateways.
//!
//! Each gateway turns a pending intent into a redirect URL and turns the
//! provider callback into a [`WebhookEvent`]. Signatures are checked only when
//! the provider secret is configured.

mod momo;
mod payos;
pub mod signing;
mod vnpay;

pub use momo::MomoGateway;
pub use payos::PayOsGateway;
pub use vnpay::VnPayGateway;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::PaymentSettings;
use crate::domain::PaymentProvider;
use crate::shared::error::AppError;

/// What a gateway needs to start a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub intent_id: Uuid,
    /// Reference the provider will echo back.
    pub provider_ref: String,
    pub amount: i64,
    pub order_no: String,
    pub return_url: String,
}

/// A verified provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub provider_ref: String,
    pub success: bool,
    pub transaction_ref: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, AppError>;

    fn parse_webhook(&self, payload: &Value) -> Result<WebhookEvent, AppError>;
}

/// Gateways by provider.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    pub fn from_settings(http: reqwest::Client, settings: &PaymentSettings) -> Self {
        Self::default()
            .with(Arc::new(VnPayGateway::new(settings.vnpay.clone())))
            .with(Arc::new(MomoGateway::new(http.clone(), settings.momo.clone())))
            .with(Arc::new(PayOsGateway::new(http, settings.payos.clone())))
    }

    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn get(&self, provider: PaymentProvider) -> Result<&Arc<dyn PaymentGateway>, AppError> {
        self.gateways.get(&provider).ok_or_else(|| {
            AppError::BadRequest(format!("Payment provider {} is not available", provider.as_str()))
        })
    }
}

/// Read a payload field as text, accepting JSON strings and numbers.
fn field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_field(payload: &Value, key: &str) -> Result<String, AppError> {
    field(payload, key).ok_or_else(|| AppError::BadRequest(format!("Missing webhook field {key}")))
}

fn invalid_signature() -> AppError {
    AppError::BadRequest("Invalid webhook signature".to_string())
}

fn signing_failed() -> AppError {
    AppError::Internal("Failed to sign payment request".to_string())
}

/// Append a query parameter to a return URL, tolerating malformed URLs.
fn with_query_param(base: &str, key: &str, value: &str) -> String {
    match url::Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.into()
        }
        Err(_) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{base}{separator}{key}={value}")
        }
    }
}
