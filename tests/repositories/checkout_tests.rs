//! Checkout transaction guards and stock bookkeeping around orders

use pretty_assertions::assert_eq;
use sqlx::PgPool;
use uuid::Uuid;

use shop_server::domain::{Cart, CartRepository, LineQuantity, OrderRepository, OrderStatus};
use shop_server::infrastructure::repositories::{PgCartRepository, PgOrderRepository};
use shop_server::shared::error::AppError;

use super::{
    cart_status, draft, inventory, order_count, seed_product, seed_promotion, seed_user,
};

const PRICE: i64 = 3_000_000;

/// A user's cart holding `quantity` units of a fresh product with `stock` units.
async fn cart_with(pool: &PgPool, stock: i32, quantity: i32) -> (Uuid, Uuid, Uuid) {
    let user = seed_user(pool).await;
    let product = seed_product(pool, "Loa Dien", PRICE, stock).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(user)).await.unwrap();
    carts
        .change_line(cart.id, product, LineQuantity::Add(quantity), PRICE)
        .await
        .unwrap();
    (user, cart.id, product)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn placing_moves_reserved_units_out_of_stock(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 2).await;
    let orders = PgOrderRepository::new(pool.clone());

    let order = orders
        .place(&draft(user, cart, &[(product, "Loa Dien", 2, PRICE)], None))
        .await
        .unwrap();

    assert_eq!(order.total, 2 * PRICE);
    assert_eq!(inventory(&pool, product).await, (3, 0));
    assert_eq!(cart_status(&pool, cart).await, "CHECKED_OUT");
    assert_eq!(orders.items(order.id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn placing_without_enough_stock_rolls_everything_back(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 2).await;
    // Stock was written down after the units were reserved.
    sqlx::query("UPDATE inventory SET stock = 1 WHERE product_id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();
    let orders = PgOrderRepository::new(pool.clone());

    let err = orders
        .place(&draft(user, cart, &[(product, "Loa Dien", 2, PRICE)], None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref msg) if msg.contains("Insufficient stock")));
    assert_eq!(order_count(&pool).await, 0);
    assert_eq!(inventory(&pool, product).await, (1, 2));
    assert_eq!(cart_status(&pool, cart).await, "ACTIVE");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn cart_edited_after_pricing_is_refused(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 1).await;
    let priced = draft(user, cart, &[(product, "Loa Dien", 1, PRICE)], None);

    // A second tab adds another unit between pricing and placing.
    PgCartRepository::new(pool.clone())
        .change_line(cart, product, LineQuantity::Add(1), PRICE)
        .await
        .unwrap();

    let err = PgOrderRepository::new(pool.clone())
        .place(&priced)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref msg) if msg.contains("Cart changed")));
    assert_eq!(order_count(&pool).await, 0);
    assert_eq!(inventory(&pool, product).await, (5, 2));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn checked_out_cart_cannot_be_placed_twice(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 1).await;
    let orders = PgOrderRepository::new(pool.clone());
    let lines = [(product, "Loa Dien", 1, PRICE)];

    orders.place(&draft(user, cart, &lines, None)).await.unwrap();
    let err = orders.place(&draft(user, cart, &lines, None)).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(order_count(&pool).await, 1);
    assert_eq!(inventory(&pool, product).await, (4, 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn exhausted_promotion_fails_the_checkout(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 1).await;
    let promotion = seed_promotion(&pool, "TET2026", 1, 1).await;

    let err = PgOrderRepository::new(pool.clone())
        .place(&draft(
            user,
            cart,
            &[(product, "Loa Dien", 1, PRICE)],
            Some((promotion, "TET2026", 10_000)),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref msg) if msg.contains("usage limit")));
    assert_eq!(order_count(&pool).await, 0);
    assert_eq!(inventory(&pool, product).await, (5, 1));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn promotion_usage_is_counted_once_per_order(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 1).await;
    let promotion = seed_promotion(&pool, "KHAITRUONG", 2, 1).await;

    PgOrderRepository::new(pool.clone())
        .place(&draft(
            user,
            cart,
            &[(product, "Loa Dien", 1, PRICE)],
            Some((promotion, "KHAITRUONG", 10_000)),
        ))
        .await
        .unwrap();

    let used = sqlx::query_scalar::<_, i32>("SELECT usage_count FROM promotions WHERE id = $1")
        .bind(promotion)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(used, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn deleting_a_cancelled_order_does_not_restock_twice(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 2).await;
    let orders = PgOrderRepository::new(pool.clone());
    let order = orders
        .place(&draft(user, cart, &[(product, "Loa Dien", 2, PRICE)], None))
        .await
        .unwrap();
    assert_eq!(inventory(&pool, product).await, (3, 0));

    orders
        .update_status(order.id, OrderStatus::Cancelled, true)
        .await
        .unwrap();
    assert_eq!(inventory(&pool, product).await, (5, 0));

    let restored = orders.delete(order.id).await.unwrap();

    assert!(!restored);
    assert_eq!(inventory(&pool, product).await, (5, 0));
    assert!(orders.find_by_id(order.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn deleting_a_pending_order_restocks_it(pool: PgPool) {
    let (user, cart, product) = cart_with(&pool, 5, 2).await;
    let orders = PgOrderRepository::new(pool.clone());
    let order = orders
        .place(&draft(user, cart, &[(product, "Loa Dien", 2, PRICE)], None))
        .await
        .unwrap();

    assert!(orders.delete(order.id).await.unwrap());
    assert_eq!(inventory(&pool, product).await, (5, 0));
}
