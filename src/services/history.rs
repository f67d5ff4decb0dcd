use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::WashHistory;
use crate::state::AppState;

/// Appends one entry per completed booking. Runs inside the completion
/// transaction; a second entry for the same booking fails on the unique index.
pub fn record(
    conn: &Connection,
    washer_id: &str,
    booking_id: &str,
    now: &DateTime<Utc>,
) -> Result<WashHistory, AppError> {
    let entry = WashHistory {
        id: Uuid::new_v4().to_string(),
        washer_id: washer_id.to_string(),
        booking_id: booking_id.to_string(),
        created_at: *now,
    };
    queries::insert_wash_history(conn, &entry)?;
    Ok(entry)
}

pub async fn list_for_washer(state: &AppState, washer_id: &str) -> Result<Vec<WashHistory>, AppError> {
    let id = washer_id.to_string();
    state
        .db
        .call(move |conn| Ok(queries::list_wash_history(conn, &id)?))
        .await
}
