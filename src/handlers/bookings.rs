use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;

use super::auth::authorize;
use super::{json_body, respond};
use crate::errors::AppError;
use crate::models::{CreateBookingRequest, Role, UpdateStatusRequest};
use crate::services::booking;
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::User]).await?;
    let request = json_body(payload)?;

    let created = booking::create_booking(&state, &user.id, request).await?;
    Ok(respond(StatusCode::CREATED, "Booking created successfully", created))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::User, Role::Provider, Role::Admin]).await?;
    let detail = booking::get_booking_detail(&state, &id, &user).await?;
    Ok(respond(StatusCode::OK, "Booking retrieved successfully", detail))
}

// GET /bookings/my-bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::User]).await?;
    let bookings = booking::list_customer_bookings(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "Bookings retrieved successfully", bookings))
}

// GET /bookings/provider-bookings
pub async fn provider_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let bookings = booking::list_provider_bookings(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "Provider bookings retrieved successfully", bookings))
}

// PATCH /bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    authorize(&state, &headers, &[Role::Admin]).await?;
    let request = json_body(payload)?;

    let updated = booking::update_status(&state, &id, request.status.as_deref()).await?;
    Ok(respond(StatusCode::OK, "Booking status updated successfully", updated))
}

// PATCH /bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::User]).await?;
    let cancelled = booking::cancel_booking(&state, &id, &user.id).await?;
    Ok(respond(StatusCode::OK, "Booking cancelled successfully", cancelled))
}
