//! Payment Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    IntentStatus, Payment, PaymentIntent, PaymentProvider, PaymentRepository, SettleOutcome,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct IntentRow {
    id: Uuid,
    order_id: Uuid,
    provider: String,
    amount: i64,
    status: String,
    provider_ref: String,
    return_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_provider(value: &str) -> Result<PaymentProvider, AppError> {
    PaymentProvider::from_str(value)
        .ok_or_else(|| AppError::Internal(format!("Unknown payment provider {}", value)))
}

impl IntentRow {
    fn into_intent(self) -> Result<PaymentIntent, AppError> {
        Ok(PaymentIntent {
            id: self.id,
            order_id: self.order_id,
            provider: parse_provider(&self.provider)?,
            amount: self.amount,
            status: IntentStatus::from_str(&self.status),
            provider_ref: self.provider_ref,
            return_url: self.return_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    intent_id: Uuid,
    provider: String,
    amount: i64,
    status: String,
    transaction_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, AppError> {
        Ok(Payment {
            id: self.id,
            order_id: self.order_id,
            intent_id: self.intent_id,
            provider: parse_provider(&self.provider)?,
            amount: self.amount,
            status: IntentStatus::from_str(&self.status),
            transaction_ref: self.transaction_ref,
            created_at: self.created_at,
        })
    }
}

const INTENT_COLUMNS: &str =
    "id, order_id, provider, amount, status, provider_ref, return_url, created_at, updated_at";

#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create_intent(&self, intent: &PaymentIntent) -> Result<PaymentIntent, AppError> {
        sqlx::query_as::<_, IntentRow>(&format!(
            r#"
            INSERT INTO payment_intents (id, order_id, provider, amount, status, provider_ref,
                                         return_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {INTENT_COLUMNS}
            "#
        ))
        .bind(intent.id)
        .bind(intent.order_id)
        .bind(intent.provider.as_str())
        .bind(intent.amount)
        .bind(intent.status.as_str())
        .bind(&intent.provider_ref)
        .bind(&intent.return_url)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Payment reference already in use".to_string())
            }
            _ => AppError::Database(e),
        })?
        .into_intent()
    }

    async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>, AppError> {
        sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(IntentRow::into_intent)
        .transpose()
    }

    async fn find_intent_by_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> Result<Option<PaymentIntent>, AppError> {
        sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE provider = $1 AND provider_ref = $2"
        ))
        .bind(provider.as_str())
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?
        .map(IntentRow::into_intent)
        .transpose()
    }

    async fn mark_paid(
        &self,
        intent_id: Uuid,
        transaction_ref: Option<String>,
    ) -> Result<SettleOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let intent = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1 FOR UPDATE"
        ))
        .bind(intent_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment intent not found".to_string()))?
        .into_intent()?;

        if intent.status == IntentStatus::Succeeded {
            return Ok(SettleOutcome::AlreadySettled);
        }

        sqlx::query(
            "UPDATE payment_intents SET status = 'SUCCEEDED', updated_at = NOW() WHERE id = $1",
        )
        .bind(intent_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, intent_id, provider, amount, status,
                                  transaction_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, 'SUCCEEDED', $6, NOW())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(intent.order_id)
        .bind(intent.id)
        .bind(intent.provider.as_str())
        .bind(intent.amount)
        .bind(&transaction_ref)
        .execute(&mut *tx)
        .await?;

        let (user_id, order_no) = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            UPDATE orders
            SET payment_status = 'PAID',
                status = CASE WHEN status = 'PENDING' THEN 'CONFIRMED' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING user_id, order_no
            "#,
        )
        .bind(intent.order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettleOutcome::Settled {
            order_id: intent.order_id,
            user_id,
            order_no,
        })
    }

    async fn mark_failed(&self, intent_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = 'FAILED', updated_at = NOW()
            WHERE id = $1 AND status <> 'SUCCEEDED'
            "#,
        )
        .bind(intent_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, order_id, intent_id, provider, amount, status, transaction_ref, created_at
            FROM payments
            WHERE order_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }
}
