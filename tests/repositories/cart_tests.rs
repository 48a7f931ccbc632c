//! Cart reservation guards

use pretty_assertions::assert_eq;
use sqlx::PgPool;

use shop_server::domain::{Cart, CartRepository, LineChange, LineQuantity};
use shop_server::infrastructure::repositories::PgCartRepository;

use super::{inventory, seed_product, seed_user};

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn reservation_only_takes_unreserved_stock(pool: PgPool) {
    let product = seed_product(&pool, "Loa Bookshelf", 4_500_000, 3).await;
    let carts = PgCartRepository::new(pool.clone());
    let first = carts.create(&Cart::for_user(seed_user(&pool).await)).await.unwrap();
    let second = carts.create(&Cart::for_user(seed_user(&pool).await)).await.unwrap();

    let applied = carts
        .change_line(first.id, product, LineQuantity::Add(2), 4_500_000)
        .await
        .unwrap();
    assert_eq!(applied, LineChange::Applied { previous: 0, current: 2 });

    let refused = carts
        .change_line(second.id, product, LineQuantity::Add(2), 4_500_000)
        .await
        .unwrap();
    assert_eq!(refused, LineChange::InsufficientStock { available: 1 });

    assert_eq!(inventory(&pool, product).await, (3, 2));
    assert!(carts.items(second.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn growing_a_line_reserves_only_the_difference(pool: PgPool) {
    let product = seed_product(&pool, "Amply Mini", 2_000_000, 5).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(seed_user(&pool).await)).await.unwrap();

    carts
        .change_line(cart.id, product, LineQuantity::Add(2), 2_000_000)
        .await
        .unwrap();
    carts
        .change_line(cart.id, product, LineQuantity::Set(4), 2_000_000)
        .await
        .unwrap();
    assert_eq!(inventory(&pool, product).await, (5, 4));

    let refused = carts
        .change_line(cart.id, product, LineQuantity::Set(6), 2_000_000)
        .await
        .unwrap();
    assert_eq!(refused, LineChange::InsufficientStock { available: 1 });
    assert_eq!(inventory(&pool, product).await, (5, 4));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn release_never_drives_reserved_below_zero(pool: PgPool) {
    let product = seed_product(&pool, "Micro Karaoke", 1_200_000, 5).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(seed_user(&pool).await)).await.unwrap();
    carts
        .change_line(cart.id, product, LineQuantity::Add(3), 1_200_000)
        .await
        .unwrap();

    // Staff corrected the counters while the line was still in the cart.
    sqlx::query("UPDATE inventory SET reserved = 1 WHERE product_id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();

    assert!(carts.remove_line(cart.id, product).await.unwrap());
    assert_eq!(inventory(&pool, product).await, (5, 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn clearing_a_cart_returns_every_reservation(pool: PgPool) {
    let speaker = seed_product(&pool, "Loa Sub", 6_000_000, 4).await;
    let cable = seed_product(&pool, "Day Loa", 150_000, 50).await;
    let carts = PgCartRepository::new(pool.clone());
    let cart = carts.create(&Cart::for_user(seed_user(&pool).await)).await.unwrap();
    carts
        .change_line(cart.id, speaker, LineQuantity::Add(2), 6_000_000)
        .await
        .unwrap();
    carts
        .change_line(cart.id, cable, LineQuantity::Add(10), 150_000)
        .await
        .unwrap();

    carts.clear(cart.id).await.unwrap();

    assert_eq!(inventory(&pool, speaker).await, (4, 0));
    assert_eq!(inventory(&pool, cable).await, (50, 0));
}
