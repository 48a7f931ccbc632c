//! Promotion Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Promotion, PromotionRepository, PromotionStats, PromotionType};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    promo_type: String,
    value: i64,
    min_order_amount: Option<i64>,
    max_discount: Option<i64>,
    usage_limit: Option<i32>,
    usage_count: i32,
    is_active: bool,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PromotionRow {
    fn into_promotion(self) -> Result<Promotion, AppError> {
        let promo_type = PromotionType::from_str(&self.promo_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown promotion type {}", self.promo_type))
        })?;
        Ok(Promotion {
            id: self.id,
            code: self.code,
            name: self.name,
            description: self.description,
            promo_type,
            value: self.value,
            min_order_amount: self.min_order_amount,
            max_discount: self.max_discount,
            usage_limit: self.usage_limit,
            usage_count: self.usage_count,
            is_active: self.is_active,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PROMOTION_COLUMNS: &str = "id, code, name, description, promo_type, value, min_order_amount, \
     max_discount, usage_limit, usage_count, is_active, starts_at, expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgPromotionRepository {
    pool: PgPool,
}

impl PgPromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionRepository for PgPromotionRepository {
    async fn list(
        &self,
        active: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Promotion>, i64), AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM promotions WHERE ($1::boolean IS NULL OR is_active = $1)",
        )
        .bind(active)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE ($1::boolean IS NULL OR is_active = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let promotions = rows
            .into_iter()
            .map(PromotionRow::into_promotion)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((promotions, total))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Promotion>, AppError> {
        sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(PromotionRow::into_promotion)
        .transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>, AppError> {
        sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .map(PromotionRow::into_promotion)
        .transpose()
    }

    async fn code_exists(&self, code: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM promotions WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create(&self, promotion: &Promotion) -> Result<Promotion, AppError> {
        sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            INSERT INTO promotions (id, code, name, description, promo_type, value, min_order_amount,
                                    max_discount, usage_limit, usage_count, is_active, starts_at,
                                    expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(promotion.id)
        .bind(&promotion.code)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.promo_type.as_str())
        .bind(promotion.value)
        .bind(promotion.min_order_amount)
        .bind(promotion.max_discount)
        .bind(promotion.usage_limit)
        .bind(promotion.usage_count)
        .bind(promotion.is_active)
        .bind(promotion.starts_at)
        .bind(promotion.expires_at)
        .bind(promotion.created_at)
        .bind(promotion.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Promotion code already exists".to_string())
            }
            _ => AppError::Database(e),
        })?
        .into_promotion()
    }

    async fn update(&self, promotion: &Promotion) -> Result<Promotion, AppError> {
        sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            UPDATE promotions
            SET name = $2, description = $3, promo_type = $4, value = $5, min_order_amount = $6,
                max_discount = $7, usage_limit = $8, is_active = $9, starts_at = $10,
                expires_at = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(promotion.id)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.promo_type.as_str())
        .bind(promotion.value)
        .bind(promotion.min_order_amount)
        .bind(promotion.max_discount)
        .bind(promotion.usage_limit)
        .bind(promotion.is_active)
        .bind(promotion.starts_at)
        .bind(promotion.expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Promotion not found".to_string()))?
        .into_promotion()
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Promotion not found".to_string()));
        }
        Ok(())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<PromotionStats, AppError> {
        let (total, active, expired, total_usage) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_active AND (expires_at IS NULL OR expires_at >= $1)),
                   COUNT(*) FILTER (WHERE expires_at < $1),
                   COALESCE(SUM(usage_count), 0)::BIGINT
            FROM promotions
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(PromotionStats {
            total,
            active,
            expired,
            total_usage,
        })
    }
}
