//! Cart Handlers
//!
//! Signed-in carts are keyed by the token's user; guest carts by the
//! `guest_id` handed out from `POST /guest-carts`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    AddCartItemRequest, MergeCartRequest, UpdateCartItemRequest,
};
use crate::application::services::{CartService, CartServiceImpl, CartView};
use crate::domain::CartOwner;
use crate::infrastructure::repositories::{PgCartRepository, PgProductRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn carts(state: &AppState) -> CartServiceImpl<PgCartRepository, PgProductRepository> {
    CartServiceImpl::new(
        Arc::new(PgCartRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
        state.pricing,
        state.settings.shop.guest_cart_ttl_days,
    )
}

async fn add(
    state: &AppState,
    owner: CartOwner,
    body: AddCartItemRequest,
) -> Result<CartView, AppError> {
    validate_body(&body)?;
    Ok(carts(state)
        .add_item(&owner, body.product_id, body.quantity)
        .await?)
}

async fn update(
    state: &AppState,
    owner: CartOwner,
    product_id: Uuid,
    body: UpdateCartItemRequest,
) -> Result<CartView, AppError> {
    validate_body(&body)?;
    Ok(carts(state)
        .update_item(&owner, product_id, body.quantity)
        .await?)
}

// Signed-in customers

pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::User(user.user_id);
    Ok(Json(carts(&state).get_cart(&owner).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(add(&state, CartOwner::User(user.user_id), body).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::User(user.user_id);
    Ok(Json(update(&state, owner, product_id, body).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::User(user.user_id);
    Ok(Json(carts(&state).remove_item(&owner, product_id).await?))
}

pub async fn clear(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::User(user.user_id);
    Ok(Json(carts(&state).clear(&owner).await?))
}

pub async fn merge(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<MergeCartRequest>,
) -> Result<Json<CartView>, AppError> {
    validate_body(&body)?;
    let view = carts(&state)
        .merge_guest_cart(&body.guest_id, user.user_id)
        .await?;
    Ok(Json(view))
}

// Guests

pub async fn create_guest_cart(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CartView>), AppError> {
    let view = carts(&state).create_guest_cart().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_guest_cart(
    State(state): State<AppState>,
    Path(guest_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::Guest(guest_id);
    Ok(Json(carts(&state).get_cart(&owner).await?))
}

pub async fn add_guest_item(
    State(state): State<AppState>,
    Path(guest_id): Path<String>,
    Json(body): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(add(&state, CartOwner::Guest(guest_id), body).await?))
}

pub async fn update_guest_item(
    State(state): State<AppState>,
    Path((guest_id, product_id)): Path<(String, Uuid)>,
    Json(body): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::Guest(guest_id);
    Ok(Json(update(&state, owner, product_id, body).await?))
}

pub async fn remove_guest_item(
    State(state): State<AppState>,
    Path((guest_id, product_id)): Path<(String, Uuid)>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::Guest(guest_id);
    Ok(Json(carts(&state).remove_item(&owner, product_id).await?))
}

pub async fn clear_guest_cart(
    State(state): State<AppState>,
    Path(guest_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    let owner = CartOwner::Guest(guest_id);
    Ok(Json(carts(&state).clear(&owner).await?))
}
