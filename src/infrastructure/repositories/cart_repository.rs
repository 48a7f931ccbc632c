//! Cart Repository Implementation
//!
//! Every line change runs in one transaction that locks the cart row,
//! adjusts the line and reserves or releases the quantity difference in
//! `inventory`. A reservation only succeeds while `stock - reserved` covers it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    Cart, CartItem, CartOwner, CartRepository, CartStatus, InventoryMovement, LineChange,
    LineQuantity, MovementType,
};
use crate::shared::error::AppError;

use super::inventory_repository::record_movements;

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_id: Option<String>,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> Cart {
        Cart {
            id: self.id,
            user_id: self.user_id,
            guest_id: self.guest_id,
            status: CartStatus::from_str(&self.status),
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    product_name: String,
    product_slug: String,
    product_image: Option<String>,
    quantity: i32,
    unit_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartItemRow {
    fn into_item(self) -> CartItem {
        CartItem {
            id: self.id,
            cart_id: self.cart_id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_slug: self.product_slug,
            product_image: self.product_image,
            quantity: self.quantity,
            unit_price: self.unit_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const CART_COLUMNS: &str = "id, user_id, guest_id, status, expires_at, created_at, updated_at";

/// Lock an ACTIVE cart for the rest of the transaction.
async fn lock_active_cart(
    tx: &mut Transaction<'static, Postgres>,
    cart_id: Uuid,
) -> Result<(), AppError> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM carts WHERE id = $1 FOR UPDATE")
        .bind(cart_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    if CartStatus::from_str(&status) != CartStatus::Active {
        return Err(AppError::Conflict("Cart is no longer active".to_string()));
    }
    Ok(())
}

fn reservation_movement(
    product_id: Uuid,
    movement_type: MovementType,
    quantity: i32,
    stock: i32,
    cart_id: Uuid,
) -> InventoryMovement {
    InventoryMovement {
        id: Uuid::now_v7(),
        product_id,
        movement_type,
        quantity,
        previous_stock: stock,
        new_stock: stock,
        reason: Some("cart".to_string()),
        reference_id: Some(cart_id.to_string()),
        created_at: Utc::now(),
    }
}

/// Reserve `quantity` units. Returns the units still available when the
/// reservation does not fit.
async fn reserve(
    tx: &mut Transaction<'static, Postgres>,
    product_id: Uuid,
    quantity: i32,
    cart_id: Uuid,
) -> Result<Result<(), i32>, AppError> {
    let stock = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE inventory
        SET reserved = reserved + $2, updated_at = NOW()
        WHERE product_id = $1 AND stock - reserved >= $2
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut **tx)
    .await?;

    match stock {
        Some(stock) => {
            let movement =
                reservation_movement(product_id, MovementType::Reserved, quantity, stock, cart_id);
            record_movements(tx, &[movement]).await?;
            Ok(Ok(()))
        }
        None => {
            let available = sqlx::query_scalar::<_, i32>(
                "SELECT GREATEST(stock - reserved, 0) FROM inventory WHERE product_id = $1",
            )
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?
            .unwrap_or(0);
            Ok(Err(available))
        }
    }
}

/// Release up to `quantity` reserved units, never below zero.
async fn release(
    tx: &mut Transaction<'static, Postgres>,
    product_id: Uuid,
    quantity: i32,
    cart_id: Uuid,
) -> Result<(), AppError> {
    let stock = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE inventory
        SET reserved = GREATEST(reserved - $2, 0), updated_at = NOW()
        WHERE product_id = $1
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(stock) = stock {
        let movement =
            reservation_movement(product_id, MovementType::Unreserved, quantity, stock, cart_id);
        record_movements(tx, &[movement]).await?;
    }
    Ok(())
}

async fn touch(tx: &mut Transaction<'static, Postgres>, cart_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn find_active(&self, owner: &CartOwner) -> Result<Option<Cart>, AppError> {
        let query = match owner {
            CartOwner::User(user_id) => sqlx::query_as::<_, CartRow>(&format!(
                "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND status = 'ACTIVE'"
            ))
            .bind(*user_id)
            .fetch_optional(&self.pool)
            .await?,
            CartOwner::Guest(guest_id) => sqlx::query_as::<_, CartRow>(&format!(
                "SELECT {CART_COLUMNS} FROM carts WHERE guest_id = $1 AND status = 'ACTIVE'"
            ))
            .bind(guest_id)
            .fetch_optional(&self.pool)
            .await?,
        };

        Ok(query.map(|r| r.into_cart()))
    }

    async fn create(&self, cart: &Cart) -> Result<Cart, AppError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            r#"
            INSERT INTO carts (id, user_id, guest_id, status, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(&cart.guest_id)
        .bind(cart.status.as_str())
        .bind(cart.expires_at)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("An active cart already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_cart())
    }

    async fn items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, AppError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT ci.id, ci.cart_id, ci.product_id,
                   p.name AS product_name, p.slug AS product_slug, p.images[1] AS product_image,
                   ci.quantity, ci.unit_price, ci.created_at, ci.updated_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_item()).collect())
    }

    async fn change_line(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: LineQuantity,
        unit_price: i64,
    ) -> Result<LineChange, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_active_cart(&mut tx, cart_id).await?;

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let previous = existing.unwrap_or(0);
        let current = quantity.resolve(previous).max(0);
        let delta = current - previous;

        if delta > 0 {
            if let Err(available) = reserve(&mut tx, product_id, delta, cart_id).await? {
                return Ok(LineChange::InsufficientStock { available });
            }
        } else if delta < 0 {
            release(&mut tx, product_id, -delta, cart_id).await?;
        }

        match (existing, current) {
            (Some(_), 0) => {
                sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                    .bind(cart_id)
                    .bind(product_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (Some(_), qty) => {
                sqlx::query(
                    "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE cart_id = $1 AND product_id = $2",
                )
                .bind(cart_id)
                .bind(product_id)
                .bind(qty)
                .execute(&mut *tx)
                .await?;
            }
            (None, 0) => {}
            (None, qty) => {
                sqlx::query(
                    r#"
                    INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
                    "#,
                )
                .bind(Uuid::now_v7())
                .bind(cart_id)
                .bind(product_id)
                .bind(qty)
                .bind(unit_price)
                .execute(&mut *tx)
                .await?;
            }
        }

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(LineChange::Applied { previous, current })
    }

    async fn remove_line(&self, cart_id: Uuid, product_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_active_cart(&mut tx, cart_id).await?;

        let removed = sqlx::query_scalar::<_, i32>(
            "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2 RETURNING quantity",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(quantity) = removed else {
            return Ok(false);
        };

        release(&mut tx, product_id, quantity, cart_id).await?;
        touch(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn clear(&self, cart_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        lock_active_cart(&mut tx, cart_id).await?;

        let removed = sqlx::query_as::<_, (Uuid, i32)>(
            "DELETE FROM cart_items WHERE cart_id = $1 RETURNING product_id, quantity",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        for (product_id, quantity) in removed {
            release(&mut tx, product_id, quantity, cart_id).await?;
        }

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn merge_into(&self, source: Uuid, target: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        lock_active_cart(&mut tx, source).await?;
        lock_active_cart(&mut tx, target).await?;

        // Units stay reserved; they only change carts.
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price, created_at, updated_at)
            SELECT gen_random_uuid(), $2, product_id, quantity, unit_price, NOW(), NOW()
            FROM cart_items
            WHERE cart_id = $1
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(source)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(source)
            .execute(&mut *tx)
            .await?;

        touch(&mut tx, target).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn assign_to_user(&self, cart_id: Uuid, user_id: Uuid) -> Result<Cart, AppError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            r#"
            UPDATE carts
            SET user_id = $2, guest_id = NULL, expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'ACTIVE'
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(cart_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

        Ok(row.into_cart())
    }

    async fn abandon_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let abandoned = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE carts
            SET status = 'ABANDONED', updated_at = NOW()
            WHERE status = 'ACTIVE' AND guest_id IS NOT NULL AND expires_at <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if abandoned.is_empty() {
            return Ok(0);
        }

        let lines = sqlx::query_as::<_, (Uuid, Uuid, i32)>(
            "SELECT cart_id, product_id, quantity FROM cart_items WHERE cart_id = ANY($1)",
        )
        .bind(&abandoned)
        .fetch_all(&mut *tx)
        .await?;

        for (cart_id, product_id, quantity) in lines {
            release(&mut tx, product_id, quantity, cart_id).await?;
        }

        tx.commit().await?;
        Ok(abandoned.len() as u64)
    }
}
