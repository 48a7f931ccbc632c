//! Health and HTTP plumbing tests

use axum::{middleware, routing::get, Router};
use axum_test::TestServer;
use serde_json::Value;

use shop_server::infrastructure::metrics;
use shop_server::presentation::http::handlers::health;
use shop_server::presentation::middleware::{create_security_headers_layer, track_metrics};

fn server(environment: &str) -> TestServer {
    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/orders/{id}", get(|| async { "order" }))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_security_headers_layer(environment));

    TestServer::new(app).expect("test server")
}

#[tokio::test]
async fn health_reports_version() {
    let response = server("development").get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn liveness_needs_no_dependencies() {
    let response = server("development").get("/health/live").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let response = server("production").get("/health").await;

    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
    assert!(response
        .header("strict-transport-security")
        .to_str()
        .unwrap()
        .starts_with("max-age="));
}

#[tokio::test]
async fn request_metrics_use_route_templates() {
    let server = server("development");
    server.get("/orders/0194b3c0-0000-7000-8000-000000000001").await;

    let exported = metrics::gather_metrics().expect("metrics");
    assert!(exported.contains(r#"path="/orders/{id}""#));
    assert!(!exported.contains("0194b3c0-0000-7000-8000-000000000001"));
}
