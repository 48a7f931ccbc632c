//! Promotion Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    CreatePromotionRequest, PromotionListQuery, UpdatePromotionRequest, ValidatePromotionRequest,
};
use crate::application::services::{
    AppliedPromotion, PromotionService, PromotionServiceImpl,
};
use crate::domain::{Promotion, PromotionStats};
use crate::infrastructure::repositories::PgPromotionRepository;
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn promotions(state: &AppState) -> PromotionServiceImpl<PgPromotionRepository> {
    PromotionServiceImpl::new(Arc::new(PgPromotionRepository::new(state.db.clone())))
}

/// Preview a code against a cart amount without consuming it.
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidatePromotionRequest>,
) -> Result<Json<AppliedPromotion>, AppError> {
    validate_body(&body)?;
    let applied = promotions(&state)
        .validate(&body.code, body.order_amount)
        .await?;
    Ok(Json(applied))
}

// Admin

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PromotionListQuery>,
) -> Result<Json<Paginated<Promotion>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(Json(promotions(&state).list(query.active, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Promotion>, AppError> {
    Ok(Json(promotions(&state).get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), AppError> {
    validate_body(&body)?;
    let promotion = promotions(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePromotionRequest>,
) -> Result<Json<Promotion>, AppError> {
    validate_body(&body)?;
    Ok(Json(promotions(&state).update(id, body).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    promotions(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Promotion>, AppError> {
    Ok(Json(promotions(&state).toggle_active(id).await?))
}

pub async fn duplicate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Promotion>), AppError> {
    let copy = promotions(&state).duplicate(id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<PromotionStats>, AppError> {
    Ok(Json(promotions(&state).stats().await?))
}
