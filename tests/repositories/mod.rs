//! Repository tests against a real Postgres.
//!
//! Each test gets a fresh database from `#[sqlx::test]` with the crate's
//! migrations applied. They are ignored by default; run them with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod booking_tests;
mod cart_tests;
mod checkout_tests;
mod user_tests;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use shop_server::domain::{
    generate_order_no, Order, OrderDraft, OrderItem, OrderStatus, PaymentStatus, ShippingAddress,
};

pub async fn seed_user(pool: &PgPool) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO users (id, email, full_name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind("Test Customer")
        .execute(pool)
        .await
        .expect("seed user");
    id
}

/// Product with an inventory row holding `stock` units.
pub async fn seed_product(pool: &PgPool, name: &str, price: i64, stock: i32) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO products (id, name, slug, sku, price) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(name)
        .bind(format!("{}-{id}", name.to_lowercase().replace(' ', "-")))
        .bind(format!("SKU-{id}"))
        .bind(price)
        .execute(pool)
        .await
        .expect("seed product");
    sqlx::query("INSERT INTO inventory (product_id, stock) VALUES ($1, $2)")
        .bind(id)
        .bind(stock)
        .execute(pool)
        .await
        .expect("seed inventory");
    id
}

pub async fn seed_promotion(
    pool: &PgPool,
    code: &str,
    usage_limit: i32,
    usage_count: i32,
) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query(
        r#"
        INSERT INTO promotions (id, code, name, promo_type, value, usage_limit, usage_count)
        VALUES ($1, $2, $3, 'FIXED_AMOUNT', 10000, $4, $5)
        "#,
    )
    .bind(id)
    .bind(code)
    .bind(code)
    .bind(usage_limit)
    .bind(usage_count)
    .execute(pool)
    .await
    .expect("seed promotion");
    id
}

/// (stock, reserved)
pub async fn inventory(pool: &PgPool, product_id: Uuid) -> (i32, i32) {
    sqlx::query_as::<_, (i32, i32)>("SELECT stock, reserved FROM inventory WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("inventory row")
}

pub async fn cart_status(pool: &PgPool, cart_id: Uuid) -> String {
    sqlx::query_scalar::<_, String>("SELECT status FROM carts WHERE id = $1")
        .bind(cart_id)
        .fetch_one(pool)
        .await
        .expect("cart row")
}

pub async fn order_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .expect("count orders")
}

/// Draft priced from `(product_id, name, quantity, unit_price)` lines.
pub fn draft(
    user_id: Uuid,
    cart_id: Uuid,
    lines: &[(Uuid, &str, i32, i64)],
    promotion: Option<(Uuid, &str, i64)>,
) -> OrderDraft {
    let order_id = Uuid::now_v7();
    let items: Vec<OrderItem> = lines
        .iter()
        .map(|&(product_id, name, quantity, unit_price)| OrderItem {
            id: Uuid::now_v7(),
            order_id,
            product_id,
            product_name: name.to_string(),
            quantity,
            unit_price,
            total_price: unit_price * i64::from(quantity),
        })
        .collect();
    let subtotal: i64 = items.iter().map(|i| i.total_price).sum();
    let discount = promotion.map(|(_, _, amount)| amount).unwrap_or(0);
    let now = Utc::now();

    OrderDraft {
        order: Order {
            id: order_id,
            order_no: generate_order_no(),
            user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            customer_name: "Test Customer".to_string(),
            customer_email: "customer@example.com".to_string(),
            customer_phone: "0901234567".to_string(),
            shipping_address: ShippingAddress {
                address: "12 Nguyen Hue".to_string(),
                ward: None,
                district: Some("District 1".to_string()),
                city: "Ho Chi Minh".to_string(),
            },
            subtotal,
            discount_amount: discount,
            shipping_cost: 0,
            total: subtotal - discount,
            promotion_code: promotion.map(|(_, code, _)| code.to_string()),
            notes: None,
            created_at: now,
            updated_at: now,
        },
        items,
        cart_id,
        promotion_id: promotion.map(|(id, _, _)| id),
    }
}
