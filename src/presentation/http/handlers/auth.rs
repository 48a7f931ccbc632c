//! Authentication Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
};
use crate::application::dto::response::{AuthResponse, TokenResponse, UserResponse};
use crate::application::services::{AuthService, AuthServiceImpl, RegisterDto};
use crate::infrastructure::repositories::{
    PgNotificationRepository, PgSessionRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn auth_service(
    state: &AppState,
) -> AuthServiceImpl<PgUserRepository, PgSessionRepository, PgNotificationRepository> {
    AuthServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
        Arc::new(PgNotificationRepository::new(state.db.clone())),
        state.token_keys.clone(),
    )
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validate_body(&body)?;

    let (user, tokens) = auth_service(&state)
        .register(RegisterDto {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, tokens))))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_body(&body)?;

    let (user, tokens) = auth_service(&state)
        .login(&body.email, &body.password)
        .await?;

    Ok(Json(AuthResponse::new(user, tokens)))
}

/// Rotate a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate_body(&body)?;

    let tokens = auth_service(&state).refresh(&body.refresh_token).await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke refresh token)
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    validate_body(&body)?;

    // Unknown tokens are already logged out
    if let Err(e) = auth_service(&state).logout(&body.refresh_token).await {
        tracing::debug!(error = %e, "Logout with unknown refresh token");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Current user's profile
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let profile = auth_service(&state).me(user.user_id).await?;
    Ok(Json(UserResponse::from(profile)))
}

/// Change the current user's password; other devices must sign in again.
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_body(&body)?;

    auth_service(&state)
        .change_password(user.user_id, &body.current_password, &body.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
