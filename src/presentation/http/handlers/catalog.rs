//! Catalog Handlers
//!
//! Public product and category browsing, plus the admin write side.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    CreateCategoryRequest, CreateProductRequest, ProductListQuery, UpdateCategoryRequest,
    UpdateProductRequest,
};
use crate::application::services::{CatalogService, CatalogServiceImpl, ProductDetail};
use crate::domain::{Category, Product};
use crate::infrastructure::cache::RedisCache;
use crate::infrastructure::repositories::{
    PgCategoryRepository, PgInventoryRepository, PgProductRepository,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Paginated;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

type Catalog = CatalogServiceImpl<
    PgProductRepository,
    PgCategoryRepository,
    PgInventoryRepository,
    RedisCache,
>;

fn catalog(state: &AppState) -> Catalog {
    CatalogServiceImpl::new(
        Arc::new(PgProductRepository::new(state.db.clone())),
        Arc::new(PgCategoryRepository::new(state.db.clone())),
        Arc::new(PgInventoryRepository::new(state.db.clone())),
        state.cache.clone(),
    )
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Paginated<Product>>, AppError> {
    let page = catalog(&state).list_products(query.into_filter()).await?;
    Ok(Json(page))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetail>, AppError> {
    Ok(Json(catalog(&state).get_product(id).await?))
}

pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>, AppError> {
    Ok(Json(catalog(&state).get_product_by_slug(&slug).await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(catalog(&state).list_categories().await?))
}

// Admin

pub async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    validate_body(&body)?;
    let product = catalog(&state).create_product(body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    validate_body(&body)?;
    Ok(Json(catalog(&state).update_product(id, body).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog(&state).delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    validate_body(&body)?;
    let category = catalog(&state).create_category(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    validate_body(&body)?;
    Ok(Json(catalog(&state).update_category(id, body).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog(&state).delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
