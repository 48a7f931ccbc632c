//! Authentication Middleware
//!
//! JWT validation for protected routes, plus the admin gate.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use uuid::Uuid;

use crate::application::services::{TokenKeys, Viewer};
use crate::domain::UserRole;
use crate::shared::error::AppError;

/// Authenticated user extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<AuthUser> for Viewer {
    fn from(user: AuthUser) -> Self {
        if user.is_admin() {
            Viewer::Admin
        } else {
            Viewer::Customer(user.user_id)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    if !headers.contains_key(AUTHORIZATION) {
        return Err(AppError::Unauthorized("Missing authorization header".into()));
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))
}

fn authenticate(keys: &TokenKeys, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers)?;
    let claims = keys.decode(&token)?;
    let user_id = claims.user_id()?;

    Ok(AuthUser {
        user_id,
        role: claims.role(),
    })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(keys): State<Arc<TokenKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&keys, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Optional authentication middleware (doesn't fail if no token)
///
/// A present but invalid token is still rejected, so an expired session
/// never silently turns into a guest checkout.
pub async fn optional_auth_middleware(
    State(keys): State<Arc<TokenKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.headers().contains_key(AUTHORIZATION) {
        let user = authenticate(&keys, request.headers())?;
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Rejects non-admin callers. Must run inside `auth_middleware`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".into()));
    }

    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtSettings;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn keys() -> Arc<TokenKeys> {
        Arc::new(TokenKeys::new(&JwtSettings {
            secret: "a-test-secret-that-is-long-enough-for-hs256".into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }))
    }

    fn app(keys: Arc<TokenKeys>) -> Router {
        let admin = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_admin));

        Router::new()
            .route("/me", get(|user: AuthUser| async move { user.user_id.to_string() }))
            .merge(admin)
            .layer(middleware::from_fn_with_state(keys.clone(), auth_middleware))
            .with_state(keys)
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let res = app(keys()).oneshot(get_with("/me", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let res = app(keys())
            .oneshot(get_with("/me", Some("not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let keys = keys();
        let tokens = keys.issue(Uuid::now_v7(), UserRole::User).unwrap();
        let res = app(keys)
            .oneshot(get_with("/me", Some(&tokens.access_token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn customers_are_kept_out_of_admin_routes() {
        let keys = keys();
        let user = keys.issue(Uuid::now_v7(), UserRole::User).unwrap();
        let admin = keys.issue(Uuid::now_v7(), UserRole::Admin).unwrap();

        let res = app(keys.clone())
            .oneshot(get_with("/admin", Some(&user.access_token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app(keys)
            .oneshot(get_with("/admin", Some(&admin.access_token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
