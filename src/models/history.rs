use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one completed wash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WashHistory {
    pub id: String,
    pub washer_id: String,
    pub booking_id: String,
    pub created_at: DateTime<Utc>,
}
