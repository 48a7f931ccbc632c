//! Inventory Repository Implementation
//!
//! Adjustments lock the inventory row with `FOR UPDATE` so concurrent
//! admin edits and cart reservations serialize on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    AdjustmentResult, InventoryAdjustment, InventoryLevel, InventoryMovement, InventoryRepository,
    MovementType,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    product_id: Uuid,
    stock: i32,
    reserved: i32,
    low_stock_threshold: i32,
    updated_at: DateTime<Utc>,
}

impl InventoryRow {
    fn into_level(self) -> InventoryLevel {
        InventoryLevel {
            product_id: self.product_id,
            stock: self.stock,
            reserved: self.reserved,
            low_stock_threshold: self.low_stock_threshold,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: i32,
    previous_stock: i32,
    new_stock: i32,
    reason: Option<String>,
    reference_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl MovementRow {
    fn into_movement(self) -> InventoryMovement {
        InventoryMovement {
            id: self.id,
            product_id: self.product_id,
            movement_type: MovementType::from_str(&self.movement_type).unwrap_or(MovementType::In),
            quantity: self.quantity,
            previous_stock: self.previous_stock,
            new_stock: self.new_stock,
            reason: self.reason,
            reference_id: self.reference_id,
            created_at: self.created_at,
        }
    }
}

/// Insert movement rows inside an open transaction.
pub(crate) async fn record_movements(
    tx: &mut Transaction<'static, Postgres>,
    movements: &[InventoryMovement],
) -> Result<(), AppError> {
    for movement in movements {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements
                (id, product_id, movement_type, quantity, previous_stock, new_stock, reason, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reason)
        .bind(&movement.reference_id)
        .bind(movement.created_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn list(
        &self,
        low_stock_only: bool,
        page: PageRequest,
    ) -> Result<(Vec<InventoryLevel>, i64), AppError> {
        const FILTER: &str =
            "WHERE ($1 = FALSE OR (low_stock_threshold > 0 AND stock <= low_stock_threshold))";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM inventory {FILTER}"))
            .bind(low_stock_only)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            r#"
            SELECT product_id, stock, reserved, low_stock_threshold, updated_at
            FROM inventory
            {FILTER}
            ORDER BY stock ASC, product_id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(low_stock_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| r.into_level()).collect(), total))
    }

    async fn find(&self, product_id: Uuid) -> Result<Option<InventoryLevel>, AppError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT product_id, stock, reserved, low_stock_threshold, updated_at
            FROM inventory
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_level()))
    }

    async fn adjust(
        &self,
        product_id: Uuid,
        adjustment: &InventoryAdjustment,
    ) -> Result<AdjustmentResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        sqlx::query(
            "INSERT INTO inventory (product_id, stock, reserved) VALUES ($1, 0, 0) ON CONFLICT (product_id) DO NOTHING",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        let before = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT product_id, stock, reserved, low_stock_threshold, updated_at
            FROM inventory
            WHERE product_id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?
        .into_level();

        let after = adjustment.apply(&before)?;

        let after = sqlx::query_as::<_, InventoryRow>(
            r#"
            UPDATE inventory
            SET stock = $2, reserved = $3, low_stock_threshold = $4, updated_at = NOW()
            WHERE product_id = $1
            RETURNING product_id, stock, reserved, low_stock_threshold, updated_at
            "#,
        )
        .bind(product_id)
        .bind(after.stock)
        .bind(after.reserved)
        .bind(after.low_stock_threshold)
        .fetch_one(&mut *tx)
        .await?
        .into_level();

        let movements = adjustment.movements(&before, &after);
        record_movements(&mut tx, &movements).await?;

        tx.commit().await?;

        Ok(AdjustmentResult {
            before,
            after,
            movements,
        })
    }

    async fn movements(
        &self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, product_id, movement_type, quantity, previous_stock, new_stock,
                   reason, reference_id, created_at
            FROM inventory_movements
            WHERE product_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_movement()).collect())
    }
}
