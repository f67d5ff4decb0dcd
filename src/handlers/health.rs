use axum::http::StatusCode;
use axum::response::Response;

use super::respond;

pub async fn health() -> Response {
    respond(StatusCode::OK, "ok", serde_json::json!({ "status": "up" }))
}
