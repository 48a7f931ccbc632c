//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers::{
    auth, bookings, carts, catalog, checkout, health, inventory, notifications, orders,
    payments, promotions, services, users,
};
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, create_security_headers_layer, optional_auth_middleware, rate_limit_api,
    rate_limit_auth, require_admin, track_metrics,
};
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        // Outermost, so error responses get the headers too
        .layer(create_security_headers_layer(&state.settings.environment))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        state.token_keys.clone(),
        auth_middleware,
    ))
}

fn optionally_authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        state.token_keys.clone(),
        optional_auth_middleware,
    ))
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/catalog", catalog_routes())
        .nest("/cart", cart_routes(&state))
        .nest("/guest-carts", guest_cart_routes())
        .merge(order_routes(&state))
        .merge(payment_routes(&state))
        .merge(service_routes())
        .merge(booking_routes(&state))
        .nest("/notifications", notification_routes(&state))
        .nest("/admin", admin_routes(&state))
        .route("/promotions/validate", post(promotions::validate))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_api))
}

/// Authentication routes (public, with stricter rate limiting)
fn auth_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token))
        .route("/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth));

    let me = authenticated(
        Router::new()
            .route("/me", get(auth::me))
            .route("/password", patch(auth::change_password)),
        state,
    );

    public.merge(me)
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/products/slug/{slug}", get(catalog::get_product_by_slug))
        .route("/categories", get(catalog::list_categories))
}

fn cart_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(carts::get_cart).delete(carts::clear))
        .route("/items", post(carts::add_item))
        .route(
            "/items/{product_id}",
            patch(carts::update_item).delete(carts::remove_item),
        )
        .route("/merge", post(carts::merge));

    authenticated(router, state)
}

fn guest_cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(carts::create_guest_cart))
        .route(
            "/{guest_id}",
            get(carts::get_guest_cart).delete(carts::clear_guest_cart),
        )
        .route("/{guest_id}/items", post(carts::add_guest_item))
        .route(
            "/{guest_id}/items/{product_id}",
            patch(carts::update_guest_item).delete(carts::remove_guest_item),
        )
}

fn order_routes(state: &AppState) -> Router<AppState> {
    let checkout = optionally_authenticated(
        Router::new().route("/checkout", post(checkout::place_order)),
        state,
    );

    let orders = authenticated(
        Router::new()
            .route("/orders", get(orders::my_orders))
            .route("/orders/{id}", get(orders::get_order)),
        state,
    );

    checkout.merge(orders)
}

fn payment_routes(state: &AppState) -> Router<AppState> {
    let intents = optionally_authenticated(
        Router::new().route("/payments/intents", post(payments::create_intent)),
        state,
    );

    let history = authenticated(
        Router::new().route("/payments/orders/{order_id}", get(payments::list_for_order)),
        state,
    );

    Router::new()
        .route("/payments/webhooks/{provider}", post(payments::webhook))
        .merge(intents)
        .merge(history)
}

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/service-types", get(services::list_types))
        .route("/service-types/{id}", get(services::get_type))
        .route("/services", get(services::list_services))
        .route("/services/{id}", get(services::get_service))
        .route("/services/slug/{slug}", get(services::get_service_by_slug))
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    let customer = authenticated(
        Router::new()
            .route("/bookings", post(bookings::create))
            .route("/bookings/me", get(bookings::my_bookings))
            .route("/bookings/{id}", get(bookings::get)),
        state,
    );

    Router::new()
        .route("/bookings/guest", post(bookings::create_guest))
        .merge(customer)
}

fn notification_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(notifications::list))
        .route("/pending", get(notifications::pending))
        .route("/stats", get(notifications::stats))
        .route("/{id}/read", patch(notifications::mark_read))
        .route("/read-all", post(notifications::mark_all_read));

    authenticated(router, state)
}

/// Staff routes. `require_admin` runs after authentication.
fn admin_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        // Catalog
        .route("/products", post(catalog::create_product))
        .route(
            "/products/{id}",
            patch(catalog::update_product).delete(catalog::delete_product),
        )
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/{id}",
            patch(catalog::update_category).delete(catalog::delete_category),
        )
        // Inventory
        .route("/inventory", get(inventory::list))
        .route(
            "/inventory/{product_id}",
            get(inventory::get).patch(inventory::adjust),
        )
        .route("/inventory/{product_id}/movements", get(inventory::movements))
        // Promotions
        .route("/promotions", get(promotions::list).post(promotions::create))
        .route("/promotions/stats", get(promotions::stats))
        .route(
            "/promotions/{id}",
            get(promotions::get)
                .patch(promotions::update)
                .delete(promotions::delete),
        )
        .route("/promotions/{id}/toggle", post(promotions::toggle))
        .route("/promotions/{id}/duplicate", post(promotions::duplicate))
        // Orders
        .route("/orders", get(orders::list))
        .route("/orders/stats", get(orders::stats))
        .route(
            "/orders/{id}",
            get(orders::admin_get)
                .patch(orders::update)
                .delete(orders::delete),
        )
        .route("/orders/{id}/status", patch(orders::update_status))
        // Services
        .route("/service-types", post(services::create_type))
        .route(
            "/service-types/{id}",
            patch(services::update_type).delete(services::delete_type),
        )
        .route(
            "/services",
            get(services::admin_list_services).post(services::create_service),
        )
        .route("/services/stats", get(services::stats))
        .route(
            "/services/{id}",
            patch(services::update_service).delete(services::delete_service),
        )
        .route("/services/{id}/items", post(services::add_item))
        .route(
            "/services/items/{item_id}",
            patch(services::update_item).delete(services::delete_item),
        )
        .route(
            "/technicians",
            get(services::list_technicians).post(services::create_technician),
        )
        // Bookings
        .route("/bookings", get(bookings::list))
        .route(
            "/bookings/{id}",
            get(bookings::admin_get)
                .patch(bookings::update)
                .delete(bookings::delete),
        )
        .route("/bookings/{id}/status", patch(bookings::update_status))
        .route("/bookings/{id}/assign", post(bookings::assign_technician))
        .route("/bookings/{id}/payments", post(bookings::create_payment))
        .route("/bookings/payments/{payment_id}", patch(bookings::update_payment))
        // Users
        .route("/users", get(users::list))
        .route("/users/stats", get(users::stats))
        .route(
            "/users/{id}",
            get(users::get).patch(users::update).delete(users::delete),
        )
        // Notifications
        .route("/notifications", post(notifications::create))
        .route_layer(middleware::from_fn(require_admin));

    authenticated(router, state)
}
