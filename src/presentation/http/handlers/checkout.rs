//! Checkout Handler

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::CheckoutRequest;
use crate::application::services::{CheckoutService, CheckoutServiceImpl, OrderDetail};
use crate::infrastructure::repositories::{
    PgCartRepository, PgNotificationRepository, PgOrderRepository, PgProductRepository,
    PgPromotionRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

/// Place an order from the caller's cart. Guests name their cart with `guest_id`.
pub async fn place_order(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    validate_body(&body)?;

    let service = CheckoutServiceImpl::new(
        Arc::new(PgCartRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
        Arc::new(PgPromotionRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgOrderRepository::new(state.db.clone())),
        Arc::new(PgNotificationRepository::new(state.db.clone())),
        state.telegram.clone(),
        state.pricing,
    );

    let order = service
        .place_order(user.map(|u| u.user_id), body)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}
