pub mod auth;
pub mod bookings;
pub mod coupons;
pub mod health;
pub mod washer;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

/// Success envelope shared by every endpoint.
pub fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(serde_json::json!({
            "success": true,
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

/// Unwraps a JSON body, turning framework rejections into the error envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(format!("Invalid request body: {}", rejection.body_text())))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/my-bookings", get(bookings::my_bookings))
        .route("/bookings/provider-bookings", get(bookings::provider_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/status", patch(bookings::update_status))
        .route("/bookings/:id/cancel", patch(bookings::cancel_booking))
        .route("/washers", get(washer::list_washers))
        .route("/washer/status", get(washer::status))
        .route("/washer/online", post(washer::go_online))
        .route("/washer/offline", post(washer::go_offline))
        .route("/washer/accept/:booking_id", post(washer::accept_booking))
        .route("/washer/complete/:booking_id", post(washer::complete_booking))
        .route("/washer/history", get(washer::history))
        .route("/coupons", post(coupons::create_coupon).get(coupons::list_coupons))
        .route("/coupons/apply", post(coupons::apply_coupon))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
