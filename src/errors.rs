use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;
use crate::services::pricing::PricingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Invalid booking status")]
    InvalidStatus,

    #[error("Booking cannot move from {from} to {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Completed booking cannot be changed")]
    AlreadyCompleted,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Washer not found")]
    ProviderNotFound,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Washer is offline")]
    ProviderOffline,

    #[error("Washer is currently busy")]
    ProviderBusy,

    #[error("Washer daily limit completed")]
    QuotaExhausted,

    #[error("Working hours are {hours}")]
    OutsideWorkingHours { hours: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage call timed out")]
    StorageTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Invalid request: {errors}"))
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Pricing(_)
            | AppError::InvalidStatus
            | AppError::IllegalTransition { .. }
            | AppError::AlreadyCompleted => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ProviderOffline
            | AppError::ProviderBusy
            | AppError::QuotaExhausted
            | AppError::OutsideWorkingHours { .. }
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BookingNotFound | AppError::ProviderNotFound | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(e) if unique_violation_field(e).is_some() => StatusCode::CONFLICT,
            AppError::StorageTimeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Infrastructure failures never leak
    /// their details.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(e) => match unique_violation_field(e) {
                Some(field) => format!("{field} already exists"),
                None => "Internal server error".to_string(),
            },
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::StorageTimeout => "Storage is not responding, please retry".to_string(),
            other => other.to_string(),
        }
    }
}

/// Column named by a SQLite UNIQUE violation, e.g. `coupon_code` from
/// "UNIQUE constraint failed: coupons.coupon_code".
fn unique_violation_field(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            let columns = msg.strip_prefix("UNIQUE constraint failed: ")?;
            let first = columns.split(',').next()?.trim();
            let field = first.rsplit('.').next().unwrap_or(first);
            Some(field.to_string())
        }
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.public_message(),
        });
        (status, axum::Json(body)).into_response()
    }
}
