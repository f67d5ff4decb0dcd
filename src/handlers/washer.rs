use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use super::auth::authorize;
use super::respond;
use crate::errors::AppError;
use crate::models::Role;
use crate::services::{availability, booking, history};
use crate::state::AppState;

// GET /washers
pub async fn list_washers(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let washers = availability::list_washers(&state).await?;
    Ok(respond(StatusCode::OK, "Washers retrieved successfully", washers))
}

// GET /washer/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let current = availability::status(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "Washer status retrieved successfully", current))
}

// POST /washer/online
pub async fn go_online(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let current = availability::go_online(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "You are now online", current))
}

// POST /washer/offline
pub async fn go_offline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let current = availability::go_offline(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "You are now offline", current))
}

// POST /washer/accept/:booking_id
pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let started = booking::accept_booking(&state, &booking_id, &user.id).await?;
    Ok(respond(StatusCode::OK, "Booking accepted, wash started", started))
}

// POST /washer/complete/:booking_id
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let (completed, entry) = booking::complete_booking(&state, &booking_id, &user.id).await?;
    Ok(respond(
        StatusCode::OK,
        "Wash completed successfully",
        serde_json::json!({ "booking": completed, "history": entry }),
    ))
}

// GET /washer/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authorize(&state, &headers, &[Role::Provider]).await?;
    let entries = history::list_for_washer(&state, &user.id).await?;
    Ok(respond(StatusCode::OK, "Wash history retrieved successfully", entries))
}
