//! Booking Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{
    AssignTechnicianRequest, BookingListQuery, CreateBookingRequest, CreateServicePaymentRequest,
    UpdateBookingRequest, UpdateBookingStatusRequest, UpdateServicePaymentRequest,
};
use crate::application::services::{BookingDetail, BookingService, BookingServiceImpl, Viewer};
use crate::domain::{Booking, ServicePayment};
use crate::infrastructure::repositories::{
    PgBookingRepository, PgServiceRepository, PgTechnicianRepository, PgUserRepository,
};
use crate::infrastructure::telegram::TelegramClient;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::validate_body;
use crate::startup::AppState;

type Bookings = BookingServiceImpl<
    PgBookingRepository,
    PgServiceRepository,
    PgTechnicianRepository,
    PgUserRepository,
    TelegramClient,
>;

fn bookings(state: &AppState) -> Bookings {
    BookingServiceImpl::new(
        Arc::new(PgBookingRepository::new(state.db.clone())),
        Arc::new(PgServiceRepository::new(state.db.clone())),
        Arc::new(PgTechnicianRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.telegram.clone(),
        state.schedule,
    )
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetail>), AppError> {
    validate_body(&body)?;
    let booking = bookings(&state).create(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn create_guest(
    State(state): State<AppState>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetail>), AppError> {
    validate_body(&body)?;
    let booking = bookings(&state).create_guest(body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(bookings(&state).list_for_user(user.user_id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>, AppError> {
    Ok(Json(bookings(&state).get(id, user.into()).await?))
}

// Admin

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Paginated<Booking>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size);
    Ok(Json(bookings(&state).list(query.status, page).await?))
}

pub async fn admin_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>, AppError> {
    Ok(Json(bookings(&state).get(id, Viewer::Admin).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    validate_body(&body)?;
    Ok(Json(bookings(&state).update(id, body).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBookingStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(bookings(&state).update_status(id, body.status).await?))
}

pub async fn assign_technician(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignTechnicianRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = bookings(&state)
        .assign_technician(id, body.technician_id)
        .await?;
    Ok(Json(booking))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    bookings(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateServicePaymentRequest>,
) -> Result<(StatusCode, Json<ServicePayment>), AppError> {
    validate_body(&body)?;
    let payment = bookings(&state)
        .create_payment(id, body.provider, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<UpdateServicePaymentRequest>,
) -> Result<Json<ServicePayment>, AppError> {
    let payment = bookings(&state)
        .update_payment_status(payment_id, body.status)
        .await?;
    Ok(Json(payment))
}
