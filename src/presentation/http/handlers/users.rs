//! User Administration Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{UpdateUserRequest, UserListQuery};
use crate::application::dto::response::UserResponse;
use crate::application::services::{UserService, UserServiceImpl};
use crate::domain::{UserStats, UserSummary};
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Paginated;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn users(state: &AppState) -> UserServiceImpl<PgUserRepository> {
    UserServiceImpl::new(Arc::new(PgUserRepository::new(state.db.clone())))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Paginated<UserSummary>>, AppError> {
    Ok(Json(users(&state).list(query.into_filter()).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = users(&state).get(id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_body(&body)?;
    let user = users(&state).update(id, body, admin.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    users(&state).delete(id, admin.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<UserStats>, AppError> {
    Ok(Json(users(&state).stats().await?))
}
