//! Service Catalog Handlers
//!
//! Installation and repair services, their types and add-on items, and the
//! technicians who carry them out.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    CreateServiceItemRequest, CreateServiceRequest, CreateServiceTypeRequest,
    CreateTechnicianRequest, ServiceListQuery, TechnicianListQuery, UpdateServiceItemRequest,
    UpdateServiceRequest, UpdateServiceTypeRequest,
};
use crate::application::services::{
    ServiceCatalogService, ServiceCatalogServiceImpl, ServiceDetail,
};
use crate::domain::{Service, ServiceItem, ServiceStats, ServiceType, Technician};
use crate::infrastructure::repositories::{
    PgServiceRepository, PgServiceTypeRepository, PgTechnicianRepository,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::validate_body;
use crate::startup::AppState;

type Catalog =
    ServiceCatalogServiceImpl<PgServiceTypeRepository, PgServiceRepository, PgTechnicianRepository>;

fn catalog(state: &AppState) -> Catalog {
    ServiceCatalogServiceImpl::new(
        Arc::new(PgServiceTypeRepository::new(state.db.clone())),
        Arc::new(PgServiceRepository::new(state.db.clone())),
        Arc::new(PgTechnicianRepository::new(state.db.clone())),
    )
}

pub async fn list_types(State(state): State<AppState>) -> Result<Json<Vec<ServiceType>>, AppError> {
    Ok(Json(catalog(&state).list_types().await?))
}

pub async fn get_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceType>, AppError> {
    Ok(Json(catalog(&state).get_type(id).await?))
}

/// Public listing shows active services unless asked otherwise.
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Paginated<Service>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    let services = catalog(&state)
        .list_services(query.type_id, Some(query.is_active.unwrap_or(true)), page)
        .await?;
    Ok(Json(services))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceDetail>, AppError> {
    Ok(Json(catalog(&state).get_service(id).await?))
}

pub async fn get_service_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ServiceDetail>, AppError> {
    Ok(Json(catalog(&state).get_service_by_slug(&slug).await?))
}

// Admin

pub async fn create_type(
    State(state): State<AppState>,
    Json(body): Json<CreateServiceTypeRequest>,
) -> Result<(StatusCode, Json<ServiceType>), AppError> {
    validate_body(&body)?;
    let service_type = catalog(&state).create_type(body).await?;
    Ok((StatusCode::CREATED, Json(service_type)))
}

pub async fn update_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateServiceTypeRequest>,
) -> Result<Json<ServiceType>, AppError> {
    validate_body(&body)?;
    Ok(Json(catalog(&state).update_type(id, body).await?))
}

pub async fn delete_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog(&state).delete_type(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin listing includes inactive services unless filtered.
pub async fn admin_list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Paginated<Service>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    let services = catalog(&state)
        .list_services(query.type_id, query.is_active, page)
        .await?;
    Ok(Json(services))
}

pub async fn create_service(
    State(state): State<AppState>,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    validate_body(&body)?;
    let service = catalog(&state).create_service(body).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<Service>, AppError> {
    validate_body(&body)?;
    Ok(Json(catalog(&state).update_service(id, body).await?))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog(&state).delete_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    Json(body): Json<CreateServiceItemRequest>,
) -> Result<(StatusCode, Json<ServiceItem>), AppError> {
    validate_body(&body)?;
    let item = catalog(&state).add_item(service_id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateServiceItemRequest>,
) -> Result<Json<ServiceItem>, AppError> {
    validate_body(&body)?;
    Ok(Json(catalog(&state).update_item(item_id, body).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog(&state).delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<ServiceStats>, AppError> {
    Ok(Json(catalog(&state).stats().await?))
}

pub async fn list_technicians(
    State(state): State<AppState>,
    Query(query): Query<TechnicianListQuery>,
) -> Result<Json<Vec<Technician>>, AppError> {
    let technicians = catalog(&state)
        .list_technicians(query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(technicians))
}

pub async fn create_technician(
    State(state): State<AppState>,
    Json(body): Json<CreateTechnicianRequest>,
) -> Result<(StatusCode, Json<Technician>), AppError> {
    validate_body(&body)?;
    let technician = catalog(&state).create_technician(body).await?;
    Ok((StatusCode::CREATED, Json(technician)))
}
