//! Payment Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::application::dto::request::CreatePaymentIntentRequest;
use crate::application::services::{
    IntentCreated, OrderService, OrderServiceImpl, PaymentService, PaymentServiceImpl,
    WebhookOutcome,
};
use crate::domain::Payment;
use crate::infrastructure::repositories::{
    PgNotificationRepository, PgOrderRepository, PgPaymentRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

fn payments(
    state: &AppState,
) -> PaymentServiceImpl<PgPaymentRepository, PgOrderRepository, PgNotificationRepository> {
    PaymentServiceImpl::new(
        Arc::new(PgPaymentRepository::new(state.db.clone())),
        Arc::new(PgOrderRepository::new(state.db.clone())),
        Arc::new(PgNotificationRepository::new(state.db.clone())),
        state.gateways.clone(),
    )
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    pub outcome: WebhookOutcome,
}

/// Start a provider payment for an order.
///
/// Guests pay by order id; signed-in customers may only pay their own orders.
pub async fn create_intent(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(body): Json<CreatePaymentIntentRequest>,
) -> Result<(StatusCode, Json<IntentCreated>), AppError> {
    validate_body(&body)?;

    if let Some(user) = user {
        let orders = OrderServiceImpl::new(
            Arc::new(PgOrderRepository::new(state.db.clone())),
            Arc::new(PgNotificationRepository::new(state.db.clone())),
        );
        orders.get(&body.order_id.to_string(), user.into()).await?;
    }

    let intent = payments(&state)
        .create_intent(body.order_id, &body.provider, &body.return_url)
        .await?;

    Ok((StatusCode::CREATED, Json(intent)))
}

/// Provider callback (IPN). The payload shape depends on the provider.
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<WebhookAck>, AppError> {
    let outcome = payments(&state).handle_webhook(&provider, &payload).await?;
    Ok(Json(WebhookAck { ok: true, outcome }))
}

pub async fn list_for_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let rows = payments(&state)
        .list_for_order(order_id, user.into())
        .await?;
    Ok(Json(rows))
}
