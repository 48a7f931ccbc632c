//! Account deletion

use pretty_assertions::assert_eq;
use sqlx::PgPool;

use shop_server::domain::{Cart, CartRepository, LineQuantity, OrderRepository, UserRepository};
use shop_server::infrastructure::repositories::{
    PgCartRepository, PgOrderRepository, PgUserRepository,
};
use shop_server::shared::error::AppError;

use super::{draft, inventory, seed_product, seed_user};

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn deleting_a_user_releases_their_cart_reservations(pool: PgPool) {
    let user = seed_user(&pool).await;
    let product = seed_product(&pool, "Loa Keo", 900_000, 4).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(user)).await.unwrap();
    carts
        .change_line(cart.id, product, LineQuantity::Add(3), 900_000)
        .await
        .unwrap();
    assert_eq!(inventory(&pool, product).await, (4, 3));

    let users = PgUserRepository::new(pool.clone());
    users.delete(user).await.unwrap();

    assert_eq!(inventory(&pool, product).await, (4, 0));
    assert!(users.find_by_id(user).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn users_with_orders_are_kept(pool: PgPool) {
    let user = seed_user(&pool).await;
    let product = seed_product(&pool, "Loa Keo", 900_000, 4).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(user)).await.unwrap();
    carts
        .change_line(cart.id, product, LineQuantity::Add(1), 900_000)
        .await
        .unwrap();
    PgOrderRepository::new(pool.clone())
        .place(&draft(user, cart.id, &[(product, "Loa Keo", 1, 900_000)], None))
        .await
        .unwrap();

    let users = PgUserRepository::new(pool.clone());
    let err = users.delete(user).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(users.find_by_id(user).await.unwrap().is_some());
}
