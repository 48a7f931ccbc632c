//! Common Test Utilities

use std::sync::Arc;

use axum::{middleware, routing::get, routing::post, Json, Router};
use axum_test::TestServer;
use uuid::Uuid;

use shop_server::application::dto::request::RegisterRequest;
use shop_server::application::services::TokenKeys;
use shop_server::config::JwtSettings;
use shop_server::domain::UserRole;
use shop_server::presentation::middleware::{
    auth_middleware, optional_auth_middleware, require_admin, AuthUser,
};
use shop_server::shared::error::AppError;
use shop_server::shared::validation::validate_body;

pub fn token_keys() -> Arc<TokenKeys> {
    Arc::new(TokenKeys::new(&JwtSettings {
        secret: "integration-secret-at-least-32-characters".into(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 30,
    }))
}

pub fn access_token(keys: &TokenKeys, role: UserRole) -> String {
    keys.issue(Uuid::now_v7(), role)
        .expect("token issued")
        .access_token
}

async fn whoami(user: AuthUser) -> String {
    user.role.to_string()
}

async fn checkout_as(user: Option<AuthUser>) -> &'static str {
    match user {
        Some(_) => "customer",
        None => "guest",
    }
}

async fn register_check(Json(body): Json<RegisterRequest>) -> Result<&'static str, AppError> {
    validate_body(&body)?;
    Ok("valid")
}

/// Router wired the way the real API layers its middleware.
pub fn auth_server(keys: Arc<TokenKeys>) -> TestServer {
    let protected = Router::new().route("/me", get(whoami)).route_layer(
        middleware::from_fn_with_state(keys.clone(), auth_middleware),
    );

    let admin = Router::new()
        .route("/admin/ping", get(|| async { "pong" }))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(keys.clone(), auth_middleware));

    let optional = Router::new().route("/checkout", post(checkout_as)).route_layer(
        middleware::from_fn_with_state(keys.clone(), optional_auth_middleware),
    );

    let app = Router::new()
        .merge(protected)
        .merge(admin)
        .merge(optional)
        .route("/register", post(register_check));

    TestServer::new(app).expect("test server")
}
