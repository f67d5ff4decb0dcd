use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Coupon;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid coupon code")]
    InvalidCoupon,
    #[error("Coupon has expired")]
    CouponExpired,
    #[error("Coupon is not available in your area")]
    CouponNotAllowedInArea,
}

/// Price snapshot taken when a booking is created. Never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: f64,
    pub discount: f64,
    pub final_price: f64,
    pub applied_coupon_id: Option<String>,
}

pub fn normalize_postal_code(postal_code: &str) -> String {
    postal_code.trim().to_uppercase()
}

pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Rounds half away from zero to cents.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Prices a booking.
///
/// `requested_code` is what the customer typed; `coupon` is the directory's
/// answer for that code (`None` if no active coupon matched). With no
/// requested code the coupon is ignored and the full price applies.
pub fn quote(
    price: f64,
    requested_code: Option<&str>,
    coupon: Option<&Coupon>,
    postal_code: &str,
    now: DateTime<Utc>,
) -> Result<PriceQuote, PricingError> {
    let Some(requested) = requested_code.map(normalize_coupon_code).filter(|c| !c.is_empty()) else {
        return Ok(PriceQuote {
            price,
            discount: 0.0,
            final_price: price,
            applied_coupon_id: None,
        });
    };

    let coupon = coupon
        .filter(|c| c.is_active && c.coupon_code == requested)
        .ok_or(PricingError::InvalidCoupon)?;

    if coupon.is_expired_at(now) {
        return Err(PricingError::CouponExpired);
    }

    if !coupon.allows_postal_code(&normalize_postal_code(postal_code)) {
        return Err(PricingError::CouponNotAllowedInArea);
    }

    let discount = round_currency(price * coupon.discount_percentage as f64 / 100.0).max(0.0);
    let final_price = round_currency(price - discount).clamp(0.0, price);

    Ok(PriceQuote {
        price,
        discount,
        final_price,
        applied_coupon_id: Some(coupon.id.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(percentage: i64, postal_codes: &[&str]) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: "cpn-1".to_string(),
            coupon_name: "Spring".to_string(),
            coupon_code: "SPR1NG".to_string(),
            discount_percentage: percentage,
            is_active: true,
            expires_at: None,
            allowed_postal_codes: postal_codes.iter().map(|s| s.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_no_code_means_full_price() {
        let q = quote(100.0, None, None, "AB1", Utc::now()).unwrap();
        assert_eq!(q.discount, 0.0);
        assert_eq!(q.final_price, 100.0);
        assert!(q.applied_coupon_id.is_none());

        let q = quote(100.0, Some("  "), None, "AB1", Utc::now()).unwrap();
        assert_eq!(q.final_price, 100.0);
    }

    #[test]
    fn test_twenty_percent_off() {
        let c = coupon(20, &["SW1A 1AA"]);
        let q = quote(100.0, Some("spr1ng"), Some(&c), "  sw1a 1aa ", Utc::now()).unwrap();
        assert_eq!(q.discount, 20.0);
        assert_eq!(q.final_price, 80.0);
        assert_eq!(q.applied_coupon_id.as_deref(), Some("cpn-1"));
    }

    #[test]
    fn test_unknown_or_inactive_coupon_is_invalid() {
        assert_eq!(
            quote(100.0, Some("NOPE00"), None, "AB1", Utc::now()),
            Err(PricingError::InvalidCoupon)
        );

        let mut c = coupon(10, &["AB1"]);
        c.is_active = false;
        assert_eq!(
            quote(100.0, Some("SPR1NG"), Some(&c), "AB1", Utc::now()),
            Err(PricingError::InvalidCoupon)
        );
    }

    #[test]
    fn test_code_mismatch_is_invalid() {
        let c = coupon(10, &["AB1"]);
        assert_eq!(
            quote(100.0, Some("OTHER1"), Some(&c), "AB1", Utc::now()),
            Err(PricingError::InvalidCoupon)
        );
    }

    #[test]
    fn test_expired_coupon() {
        let now = Utc::now();
        let mut c = coupon(10, &["AB1"]);
        c.expires_at = Some(now - Duration::minutes(1));
        assert_eq!(
            quote(100.0, Some("SPR1NG"), Some(&c), "AB1", now),
            Err(PricingError::CouponExpired)
        );

        c.expires_at = Some(now + Duration::days(1));
        assert!(quote(100.0, Some("SPR1NG"), Some(&c), "AB1", now).is_ok());
    }

    #[test]
    fn test_postal_code_outside_allow_list() {
        let c = coupon(10, &["AB1"]);
        assert_eq!(
            quote(100.0, Some("SPR1NG"), Some(&c), "ZZ9", Utc::now()),
            Err(PricingError::CouponNotAllowedInArea)
        );
    }

    #[test]
    fn test_full_discount_floors_at_zero() {
        let c = coupon(100, &["AB1"]);
        let q = quote(49.99, Some("SPR1NG"), Some(&c), "AB1", Utc::now()).unwrap();
        assert_eq!(q.discount, 49.99);
        assert_eq!(q.final_price, 0.0);
    }

    #[test]
    fn test_rounds_to_cents_and_stays_in_range() {
        let c = coupon(33, &["AB1"]);
        for price in [0.01, 0.05, 1.0, 9.99, 33.33, 100.0, 1234.56] {
            let q = quote(price, Some("SPR1NG"), Some(&c), "AB1", Utc::now()).unwrap();
            assert!(q.final_price >= 0.0 && q.final_price <= price, "price {price}");
            assert_eq!(q.discount, round_currency(q.discount));
        }
        let q = quote(9.99, Some("SPR1NG"), Some(&c), "AB1", Utc::now()).unwrap();
        assert_eq!(q.discount, 3.3);
        assert_eq!(q.final_price, 6.69);
    }

    #[test]
    fn test_same_inputs_same_quote() {
        let c = coupon(15, &["AB1"]);
        let now = Utc::now();
        let first = quote(80.0, Some("SPR1NG"), Some(&c), "ab1", now).unwrap();
        let second = quote(80.0, Some("SPR1NG"), Some(&c), "ab1", now).unwrap();
        assert_eq!(first, second);
    }
}
