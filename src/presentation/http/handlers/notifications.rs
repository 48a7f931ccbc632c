//! Notification Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{CreateNotificationRequest, NotificationListQuery};
use crate::application::dto::response::CountResponse;
use crate::application::services::{
    NotificationPage, NotificationService, NotificationServiceImpl,
};
use crate::domain::{Notification, NotificationStats};
use crate::infrastructure::repositories::PgNotificationRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn notifications(state: &AppState) -> NotificationServiceImpl<PgNotificationRepository> {
    NotificationServiceImpl::new(Arc::new(PgNotificationRepository::new(state.db.clone())))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<NotificationPage>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let listing = notifications(&state)
        .list(user.user_id, query.read, page)
        .await?;
    Ok(Json(listing))
}

pub async fn pending(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(notifications(&state).pending(user.user_id).await?))
}

pub async fn stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<NotificationStats>, AppError> {
    Ok(Json(notifications(&state).stats(user.user_id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(notifications(&state).mark_read(id, user.user_id).await?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = notifications(&state).mark_all_read(user.user_id).await?;
    Ok(Json(CountResponse { count }))
}

// Admin

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    validate_body(&body)?;
    let notification = notifications(&state)
        .create(
            body.user_id,
            body.notification_type,
            body.title,
            body.message,
            body.data,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
