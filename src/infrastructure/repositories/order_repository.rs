//! Order Repository Implementation
//!
//! `place` is the checkout transaction: the cart row is locked, the order and
//! its items are written, stock and reservations are decremented, promotion
//! usage is counted and the cart is closed. Any guard failure rolls it all back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    InventoryMovement, MovementType, Order, OrderDraft, OrderItem, OrderRepository, OrderStats,
    OrderStatus, PaymentStatus, ShippingAddress, StatusCount,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

use super::inventory_repository::record_movements;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_no: String,
    user_id: Uuid,
    status: String,
    payment_status: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: String,
    shipping_ward: Option<String>,
    shipping_district: Option<String>,
    shipping_city: String,
    subtotal: i64,
    discount_amount: i64,
    shipping_cost: i64,
    total: i64,
    promotion_code: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, AppError> {
        let status = OrderStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown order status {}", self.status)))?;
        Ok(Order {
            id: self.id,
            order_no: self.order_no,
            user_id: self.user_id,
            status,
            payment_status: PaymentStatus::from_str(&self.payment_status),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address: ShippingAddress {
                address: self.shipping_address,
                ward: self.shipping_ward,
                district: self.shipping_district,
                city: self.shipping_city,
            },
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            shipping_cost: self.shipping_cost,
            total: self.total,
            promotion_code: self.promotion_code,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: i64,
    total_price: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
        }
    }
}

const ORDER_COLUMNS: &str = "id, order_no, user_id, status, payment_status, customer_name, \
     customer_email, customer_phone, shipping_address, shipping_ward, shipping_district, \
     shipping_city, subtotal, discount_amount, shipping_cost, total, promotion_code, notes, \
     created_at, updated_at";

fn rows_into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, AppError> {
    rows.into_iter().map(OrderRow::into_order).collect()
}

async fn lock_order(
    tx: &mut Transaction<'static, Postgres>,
    id: Uuid,
) -> Result<(OrderStatus, String), AppError> {
    let (status, order_no) = sqlx::query_as::<_, (String, String)>(
        "SELECT status, order_no FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let status = OrderStatus::from_str(&status)
        .ok_or_else(|| AppError::Internal(format!("Unknown order status {}", status)))?;
    Ok((status, order_no))
}

/// Put every unit of an order back into stock.
async fn restock(
    tx: &mut Transaction<'static, Postgres>,
    order_id: Uuid,
    order_no: &str,
    reason: &str,
) -> Result<(), AppError> {
    let items = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT product_id, quantity FROM order_items WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut movements = Vec::with_capacity(items.len());
    for (product_id, quantity) in items {
        let new_stock = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE inventory
            SET stock = stock + $2, updated_at = NOW()
            WHERE product_id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut **tx)
        .await?;

        // Products deleted since the order was placed have no inventory row.
        if let Some(new_stock) = new_stock {
            movements.push(InventoryMovement {
                id: Uuid::now_v7(),
                product_id,
                movement_type: MovementType::In,
                quantity,
                previous_stock: new_stock - quantity,
                new_stock,
                reason: Some(reason.to_string()),
                reference_id: Some(order_no.to_string()),
                created_at: Utc::now(),
            });
        }
    }

    record_movements(tx, &movements).await
}

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn place(&self, draft: &OrderDraft) -> Result<Order, AppError> {
        let order = &draft.order;
        let mut tx = self.pool.begin().await?;

        let cart_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM carts WHERE id = $1 FOR UPDATE",
        )
        .bind(draft.cart_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;
        if cart_status != "ACTIVE" {
            return Err(AppError::Conflict("Cart has already been checked out".to_string()));
        }

        let lines = sqlx::query_as::<_, (Uuid, i32, i64)>(
            "SELECT product_id, quantity, unit_price FROM cart_items WHERE cart_id = $1",
        )
        .bind(draft.cart_id)
        .fetch_all(&mut *tx)
        .await?;
        if !draft.matches_cart(&lines) {
            return Err(AppError::Conflict(
                "Cart changed during checkout, please review it and try again".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, order_no, user_id, status, payment_status, customer_name,
                                customer_email, customer_phone, shipping_address, shipping_ward,
                                shipping_district, shipping_city, subtotal, discount_amount,
                                shipping_cost, total, promotion_id, promotion_code, notes,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(&order.order_no)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.ward)
        .bind(&order.shipping_address.district)
        .bind(&order.shipping_address.city)
        .bind(order.subtotal)
        .bind(order.discount_amount)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(draft.promotion_id)
        .bind(&order.promotion_code)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut movements = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity,
                                         unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await?;

            let new_stock = sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE inventory
                SET stock = stock - $2, reserved = GREATEST(reserved - $2, 0), updated_at = NOW()
                WHERE product_id = $1 AND stock >= $2
                RETURNING stock
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!("Insufficient stock for {}", item.product_name))
            })?;

            movements.push(InventoryMovement {
                id: Uuid::now_v7(),
                product_id: item.product_id,
                movement_type: MovementType::Out,
                quantity: item.quantity,
                previous_stock: new_stock + item.quantity,
                new_stock,
                reason: Some("order".to_string()),
                reference_id: Some(order.order_no.clone()),
                created_at: Utc::now(),
            });
        }
        record_movements(&mut tx, &movements).await?;

        if let Some(promotion_id) = draft.promotion_id {
            let used = sqlx::query(
                r#"
                UPDATE promotions
                SET usage_count = usage_count + 1, updated_at = NOW()
                WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
                "#,
            )
            .bind(promotion_id)
            .execute(&mut *tx)
            .await?;

            if used.rows_affected() == 0 {
                return Err(AppError::Conflict("Promotion usage limit reached".to_string()));
            }
        }

        sqlx::query("UPDATE carts SET status = 'CHECKED_OUT', updated_at = NOW() WHERE id = $1")
            .bind(draft.cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.into_order()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(OrderRow::into_order)
            .transpose()
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, AppError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1"
        ))
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await?
        .map(OrderRow::into_order)
        .transpose()
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price, total_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let status = status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows_into_orders(rows)?, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows_into_orders(rows)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        restore_stock: bool,
    ) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;
        let (current, order_no) = lock_order(&mut tx, id).await?;

        if !current.can_transition_to(status) {
            return Err(AppError::BadRequest(format!(
                "Cannot change order status from {} to {}",
                current.as_str(),
                status.as_str()
            )));
        }

        if restore_stock {
            let reason = format!("order {}", status.label());
            restock(&mut tx, id, &order_no, &reason).await?;
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_order()
    }

    async fn update_details(&self, order: &Order) -> Result<Order, AppError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET notes = $2, shipping_address = $3, shipping_ward = $4, shipping_district = $5,
                shipping_city = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(&order.notes)
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.ward)
        .bind(&order.shipping_address.district)
        .bind(&order.shipping_address.city)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?
        .into_order()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let (current, order_no) = lock_order(&mut tx, id).await?;

        if !current.is_deletable() {
            return Err(AppError::BadRequest(format!(
                "Orders in status {} cannot be deleted",
                current.as_str()
            )));
        }

        // Cancelled and returned orders already gave their stock back
        let restore_stock = !current.restores_stock();
        if restore_stock {
            restock(&mut tx, id, &order_no, "order deleted").await?;
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(restore_stock)
    }

    async fn stats(&self) -> Result<OrderStats, AppError> {
        let by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let revenue = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE payment_status = 'PAID'",
        )
        .fetch_one(&self.pool)
        .await?;

        let total_orders = by_status.iter().map(|(_, count)| count).sum();
        Ok(OrderStats {
            total_orders,
            by_status: by_status
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            revenue,
        })
    }
}
