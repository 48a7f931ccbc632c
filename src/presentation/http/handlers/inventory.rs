//! Inventory Handlers (admin)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    AdjustInventoryRequest, InventoryListQuery, MovementsQuery,
};
use crate::application::services::{
    AdjustmentView, InventoryService, InventoryServiceImpl, InventoryView,
};
use crate::domain::InventoryMovement;
use crate::infrastructure::repositories::{PgInventoryRepository, PgProductRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn inventory(state: &AppState) -> InventoryServiceImpl<PgInventoryRepository, PgProductRepository> {
    InventoryServiceImpl::new(
        Arc::new(PgInventoryRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
    )
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<InventoryListQuery>,
) -> Result<Json<Paginated<InventoryView>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    let views = inventory(&state)
        .list(query.low_stock_only.unwrap_or(false), page)
        .await?;
    Ok(Json(views))
}

pub async fn get(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<InventoryView>, AppError> {
    Ok(Json(inventory(&state).get(product_id).await?))
}

pub async fn adjust(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(body): Json<AdjustInventoryRequest>,
) -> Result<Json<AdjustmentView>, AppError> {
    validate_body(&body)?;
    let view = inventory(&state).adjust(product_id, body.into()).await?;
    Ok(Json(view))
}

pub async fn movements(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<Vec<InventoryMovement>>, AppError> {
    Ok(Json(inventory(&state).movements(product_id, query.limit).await?))
}
