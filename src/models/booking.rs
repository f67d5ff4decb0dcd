use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::service::ServiceSummary;
use super::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub price: f64,
    pub discount_price: f64,
    pub final_price: f64,
    pub coupon_id: Option<String>,
    pub address: Address,
    pub booking_date: DateTime<Utc>,
    pub payment: Payment,
    pub status: BookingStatus,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Ongoing,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Ongoing => "ongoing",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "accepted" => Some(BookingStatus::Accepted),
            "ongoing" => Some(BookingStatus::Ongoing),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Legal single-step transitions. `completed` and `cancelled` are terminal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Ongoing)
                | (Accepted, Cancelled)
                | (Ongoing, Completed)
        )
    }

    /// A washer accepting a booking moves it straight to `ongoing`, collapsing
    /// `pending -> accepted -> ongoing` into one step.
    pub fn can_start_wash(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address_line: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Validate for Address {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.address_line.trim().is_empty() {
            errors.add("addressLine", ValidationError::new("length"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            errors.add("latitude", ValidationError::new("range"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            errors.add("longitude", ValidationError::new("range"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Online => "online",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "online" => Some(PaymentMethod::Online),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Payment details are stored as given; nothing here settles money.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trx_id: Option<String>,
}

/// Raw booking request body. Every field is optional so that a missing one
/// becomes a validation error with a useful message instead of a rejection
/// from the JSON extractor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub provider: Option<String>,
    pub service: Option<String>,
    pub price: Option<f64>,
    pub coupon_code: Option<String>,
    pub address: Option<Address>,
    pub booking_date: Option<DateTime<Utc>>,
    pub payment: Option<Payment>,
    pub postal_code: Option<String>,
}

/// A booking request with every required field present.
#[derive(Debug, Clone, Validate)]
pub struct NewBooking {
    #[validate(length(min = 1))]
    pub provider_id: String,
    #[validate(length(min = 1))]
    pub service_id: String,
    #[validate(range(min = 0.01))]
    pub price: f64,
    pub coupon_code: Option<String>,
    pub address: Address,
    pub booking_date: DateTime<Utc>,
    pub payment: Payment,
    #[validate(length(min = 1))]
    pub postal_code: String,
}

impl NewBooking {
    /// Field rules plus the address rules.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.address.validate()
    }
}

impl CreateBookingRequest {
    /// Names of the required fields absent from the request.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.provider) {
            missing.push("provider");
        }
        if is_blank(&self.service) {
            missing.push("service");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if self.address.is_none() {
            missing.push("address");
        }
        if self.booking_date.is_none() {
            missing.push("bookingDate");
        }
        if self.payment.is_none() {
            missing.push("payment");
        }
        if is_blank(&self.postal_code) {
            missing.push("postalCode");
        }
        missing
    }

    pub fn into_new_booking(self) -> Option<NewBooking> {
        Some(NewBooking {
            provider_id: self.provider.filter(|s| !s.trim().is_empty())?,
            service_id: self.service.filter(|s| !s.trim().is_empty())?,
            price: self.price?,
            coupon_code: self.coupon_code.filter(|c| !c.trim().is_empty()),
            address: self.address?,
            booking_date: self.booking_date?,
            payment: self.payment?,
            postal_code: self.postal_code.filter(|s| !s.trim().is_empty())?,
        })
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

/// Booking with its parties and service resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub customer: Option<UserSummary>,
    pub provider: Option<UserSummary>,
    pub service: Option<ServiceSummary>,
}
