use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;

use super::auth::authorize;
use super::{json_body, respond};
use crate::errors::AppError;
use crate::models::{ApplyCouponRequest, CreateCouponRequest, Role};
use crate::services::coupons;
use crate::state::AppState;

const ANY_ROLE: [Role; 3] = [Role::User, Role::Provider, Role::Admin];

// POST /coupons
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateCouponRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    authorize(&state, &headers, &[Role::Admin]).await?;
    let request = json_body(payload)?;

    let coupon = coupons::create_coupon(&state, request).await?;
    Ok(respond(StatusCode::CREATED, "Coupon created successfully", coupon))
}

// GET /coupons
pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authorize(&state, &headers, &ANY_ROLE).await?;
    let all = coupons::list_coupons(&state).await?;
    Ok(respond(StatusCode::OK, "Coupons retrieved successfully", all))
}

// POST /coupons/apply
pub async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ApplyCouponRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    authorize(&state, &headers, &ANY_ROLE).await?;
    let request = json_body(payload)?;

    let preview = coupons::preview_coupon(&state, request).await?;
    Ok(respond(StatusCode::OK, "Coupon applied successfully", preview))
}
