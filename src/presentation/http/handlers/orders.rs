//! Order Handlers
//!
//! Customers read their own orders; staff run the status machine.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    OrderListQuery, UpdateOrderRequest, UpdateOrderStatusRequest,
};
use crate::application::services::{OrderDetail, OrderService, OrderServiceImpl, Viewer};
use crate::domain::{Order, OrderStats};
use crate::infrastructure::repositories::{PgNotificationRepository, PgOrderRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn orders(state: &AppState) -> OrderServiceImpl<PgOrderRepository, PgNotificationRepository> {
    OrderServiceImpl::new(
        Arc::new(PgOrderRepository::new(state.db.clone())),
        Arc::new(PgNotificationRepository::new(state.db.clone())),
    )
}

pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(orders(&state).list_for_user(user.user_id).await?))
}

/// `key` is an order id or an order number such as `ATL-1768460000000-3F2A`.
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).get(&key, user.into()).await?))
}

// Admin

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<Order>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(Json(orders(&state).list(query.status, page).await?))
}

pub async fn admin_get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).get(&key, Viewer::Admin).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(orders(&state).update_status(id, body.status).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    validate_body(&body)?;
    let order = orders(&state)
        .update(id, body.notes, body.shipping_address.map(Into::into))
        .await?;
    Ok(Json(order))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    orders(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<OrderStats>, AppError> {
    Ok(Json(orders(&state).stats().await?))
}
