//! Payment intents and settled payments for orders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Vnpay,
    Momo,
    Payos,
}

impl PaymentProvider {
    /// Accepts both `VNPAY` and the lowercase path form `vnpay`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VNPAY" => Some(Self::Vnpay),
            "MOMO" => Some(Self::Momo),
            "PAYOS" => Some(Self::Payos),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vnpay => "VNPAY",
            Self::Momo => "MOMO",
            Self::Payos => "PAYOS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl IntentStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

/// Maps to `payment_intents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: PaymentProvider,
    pub amount: i64,
    pub status: IntentStatus,
    /// Reference the provider echoes back in its callback.
    pub provider_ref: String,
    pub return_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PayOS wants a positive integer order code below 2^53. Three random low
/// digits keep intents created in the same millisecond apart.
pub fn payos_order_code(millis: i64, jitter: u16) -> i64 {
    (millis % 9_000_000_000_000) * 1000 + i64::from(jitter % 1000)
}

impl PaymentIntent {
    pub fn new(order_id: Uuid, provider: PaymentProvider, amount: i64, return_url: String) -> Self {
        let now = Utc::now();
        let id = Uuid::now_v7();
        let provider_ref = match provider {
            PaymentProvider::Payos => {
                payos_order_code(now.timestamp_millis(), rand::rng().random_range(0..1000))
                    .to_string()
            }
            _ => id.simple().to_string(),
        };
        Self {
            id,
            order_id,
            provider,
            amount,
            status: IntentStatus::Pending,
            provider_ref,
            return_url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Maps to `payments`. One row per settled intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub intent_id: Uuid,
    pub provider: PaymentProvider,
    pub amount: i64,
    pub status: IntentStatus,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The intent had already succeeded; nothing was written.
    AlreadySettled,
    Settled { order_id: Uuid, user_id: Uuid, order_no: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_intent(&self, intent: &PaymentIntent) -> Result<PaymentIntent, AppError>;

    async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>, AppError>;

    async fn find_intent_by_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> Result<Option<PaymentIntent>, AppError>;

    /// Lock the intent; if still open mark it SUCCEEDED, insert the payment
    /// row and mark the order PAID (PENDING orders become CONFIRMED).
    async fn mark_paid(
        &self,
        intent_id: Uuid,
        transaction_ref: Option<String>,
    ) -> Result<SettleOutcome, AppError>;

    /// No effect on intents that already succeeded.
    async fn mark_failed(&self, intent_id: Uuid) -> Result<(), AppError>;

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_path_segments() {
        assert_eq!(PaymentProvider::from_str("vnpay"), Some(PaymentProvider::Vnpay));
        assert_eq!(PaymentProvider::from_str("MoMo"), Some(PaymentProvider::Momo));
        assert_eq!(PaymentProvider::from_str("cod"), None);
    }

    #[test]
    fn payos_codes_differ_within_a_millisecond() {
        let millis = 1_768_460_000_000;
        assert_eq!(payos_order_code(millis, 7), 1_768_460_000_000_007);
        assert_ne!(payos_order_code(millis, 7), payos_order_code(millis, 8));
        assert!(payos_order_code(8_999_999_999_999, 999) < 1 << 53);
    }

    #[test]
    fn payos_refs_are_numeric() {
        let intent = PaymentIntent::new(Uuid::nil(), PaymentProvider::Payos, 1000, "x".into());
        assert!(intent.provider_ref.parse::<i64>().unwrap() > 0);

        let intent = PaymentIntent::new(Uuid::nil(), PaymentProvider::Vnpay, 1000, "x".into());
        assert_eq!(intent.provider_ref, intent.id.simple().to_string());
    }
}
