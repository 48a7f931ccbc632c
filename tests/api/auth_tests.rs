//! Authentication API Tests

use axum::http::StatusCode;
use fake::{faker::internet::en::SafeEmail, Fake};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use shop_server::domain::UserRole;

use crate::common::{access_token, auth_server, token_keys};

#[tokio::test]
async fn protected_route_without_token_is_401() {
    let server = auth_server(token_keys());

    let response = server.get("/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let server = auth_server(token_keys());
    let foreign = shop_server::application::services::TokenKeys::new(
        &shop_server::config::JwtSettings {
            secret: "some-other-secret-that-is-also-long-enough".into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        },
    );

    let response = server
        .get("/me")
        .authorization_bearer(access_token(&foreign, UserRole::User))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_exposes_role_to_handler() {
    let keys = token_keys();
    let server = auth_server(keys.clone());

    let response = server
        .get("/me")
        .authorization_bearer(access_token(&keys, UserRole::Admin))
        .await;

    response.assert_status_ok();
    response.assert_text("ADMIN");
}

#[tokio::test]
async fn admin_routes_reject_customers() {
    let keys = token_keys();
    let server = auth_server(keys.clone());

    let response = server
        .get("/admin/ping")
        .authorization_bearer(access_token(&keys, UserRole::User))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], 10004);

    server
        .get("/admin/ping")
        .authorization_bearer(access_token(&keys, UserRole::Admin))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn checkout_without_token_proceeds_as_guest() {
    let keys = token_keys();
    let server = auth_server(keys.clone());

    server.post("/checkout").await.assert_text("guest");
    server
        .post("/checkout")
        .authorization_bearer(access_token(&keys, UserRole::User))
        .await
        .assert_text("customer");
}

#[tokio::test]
async fn checkout_with_broken_token_is_not_downgraded_to_guest() {
    let server = auth_server(token_keys());

    server
        .post("/checkout")
        .authorization_bearer("expired.or.forged")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_validation_lists_field_errors() {
    let server = auth_server(token_keys());

    let response = server
        .post("/register")
        .json(&json!({
            "email": "not-an-email",
            "password": "short",
            "full_name": "Nguyễn Văn An",
            "phone": "12345"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], 10007);

    let mut fields: Vec<String> = body["errors"]
        .as_array()
        .expect("field errors")
        .iter()
        .map(|e| e["field"].as_str().unwrap_or_default().to_string())
        .collect();
    fields.sort();
    assert_eq!(fields, vec!["email", "password", "phone"]);
}

#[tokio::test]
async fn registration_accepts_spaced_vietnamese_phone() {
    let server = auth_server(token_keys());
    let email: String = SafeEmail().fake();

    server
        .post("/register")
        .json(&json!({
            "email": email,
            "password": "correct horse battery",
            "full_name": "Nguyễn Văn An",
            "phone": "0912 345 678"
        }))
        .await
        .assert_text("valid");
}
