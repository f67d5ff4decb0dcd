use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const COUPON_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub coupon_name: String,
    pub coupon_code: String,
    pub discount_percentage: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub allowed_postal_codes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }

    /// `postal_code` must already be normalized.
    pub fn allows_postal_code(&self, postal_code: &str) -> bool {
        self.allowed_postal_codes.iter().any(|c| c == postal_code)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 100))]
    pub coupon_name: String,
    #[validate(range(min = 1, max = 100))]
    pub discount_percentage: i64,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub allowed_postal_codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    pub coupon_code: Option<String>,
    pub price: Option<f64>,
    pub postal_code: Option<String>,
}
