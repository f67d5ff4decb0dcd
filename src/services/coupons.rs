use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, ErrorCode};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::coupon::COUPON_CODE_LEN;
use crate::models::{ApplyCouponRequest, Coupon, CreateCouponRequest};
use crate::services::pricing::{self, PriceQuote, PricingError};
use crate::state::AppState;

const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreview {
    pub coupon_code: String,
    pub discount_percentage: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PriceQuote>,
}

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..COUPON_CODE_LEN].to_uppercase()
}

pub async fn create_coupon(state: &AppState, request: CreateCouponRequest) -> Result<Coupon, AppError> {
    request.validate()?;
    let now = state.clock.now().trunc_subsecs(0);

    let coupon = state
        .db
        .call(move |conn| insert_with_fresh_code(conn, request, now))
        .await?;

    tracing::info!(coupon_id = %coupon.id, code = %coupon.coupon_code, "coupon created");
    Ok(coupon)
}

fn insert_with_fresh_code(
    conn: &Connection,
    request: CreateCouponRequest,
    now: DateTime<Utc>,
) -> Result<Coupon, AppError> {
    let mut coupon = Coupon {
        id: Uuid::new_v4().to_string(),
        coupon_name: request.coupon_name.trim().to_string(),
        coupon_code: String::new(),
        discount_percentage: request.discount_percentage,
        is_active: true,
        expires_at: request.expires_at.map(|at| at.trunc_subsecs(0)),
        allowed_postal_codes: request
            .allowed_postal_codes
            .iter()
            .map(|c| pricing::normalize_postal_code(c))
            .filter(|c| !c.is_empty())
            .collect(),
        created_at: now,
        updated_at: now,
    };

    for _ in 0..CODE_ATTEMPTS {
        coupon.coupon_code = generate_code();
        match queries::insert_coupon(conn, &coupon) {
            Ok(()) => return Ok(coupon),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                tracing::debug!(code = %coupon.coupon_code, "coupon code collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Conflict(
        "Coupon code already exists. Please try again.".to_string(),
    ))
}

pub async fn list_coupons(state: &AppState) -> Result<Vec<Coupon>, AppError> {
    state
        .db
        .call(|conn| Ok(queries::list_coupons(conn)?))
        .await
}

/// Checks a code without booking anything. With a price and postal code the
/// full quote is computed the same way booking creation does it.
pub async fn preview_coupon(state: &AppState, request: ApplyCouponRequest) -> Result<CouponPreview, AppError> {
    let code = request
        .coupon_code
        .as_deref()
        .map(pricing::normalize_coupon_code)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Coupon code is required".to_string()))?;

    if let Some(price) = request.price {
        if price.is_nan() || price <= 0.0 {
            return Err(AppError::Validation("Price must be greater than 0".to_string()));
        }
    }

    let now = state.clock.now();
    let lookup = code.clone();
    let coupon = state
        .db
        .call(move |conn| Ok(queries::find_active_coupon(conn, &lookup)?))
        .await?
        .ok_or(PricingError::InvalidCoupon)?;

    if coupon.is_expired_at(now) {
        return Err(PricingError::CouponExpired.into());
    }

    let quote = match (request.price, request.postal_code.as_deref()) {
        (Some(price), Some(postal_code)) => {
            Some(pricing::quote(price, Some(&code), Some(&coupon), postal_code, now)?)
        }
        _ => None,
    };

    Ok(CouponPreview {
        coupon_code: coupon.coupon_code,
        discount_percentage: coupon.discount_percentage,
        quote,
    })
}

/// Deactivates coupons past their expiry. Returns how many changed.
pub async fn sweep_expired(state: &AppState) -> Result<usize, AppError> {
    let now = state.clock.now();
    let count = state
        .db
        .call(move |conn| Ok(queries::deactivate_expired_coupons(conn, &now)?))
        .await?;
    if count > 0 {
        tracing::info!(count, "expired coupons deactivated");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::config::AppConfig;
    use crate::db::{self, Db};
    use crate::models::WorkingHours;
    use crate::services::clock::FixedClock;
    use crate::services::notifications::LogNotifier;

    fn noon() -> DateTime<Utc> {
        NaiveDateTime::parse_from_str("2025-06-16 12:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    fn test_state() -> (AppState, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(noon()));
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            auth_secret: "secret".to_string(),
            notify_webhook_url: String::new(),
            working_hours: WorkingHours::default(),
            default_daily_wash_limit: 5,
            strict_completion_ownership: false,
            storage_timeout: StdDuration::from_secs(5),
            coupon_sweep_interval: StdDuration::from_secs(3600),
        };
        let state = AppState {
            db: Db::new(db::init_db(":memory:").unwrap(), config.storage_timeout),
            config,
            clock: clock.clone(),
            notifier: Arc::new(LogNotifier),
        };
        (state, clock)
    }

    fn create_request(pct: i64, expires_at: Option<DateTime<Utc>>) -> CreateCouponRequest {
        CreateCouponRequest {
            coupon_name: "Summer".to_string(),
            discount_percentage: pct,
            expires_at,
            allowed_postal_codes: vec![" ab1 2cd ".to_string()],
        }
    }

    #[test]
    fn test_generated_codes_are_six_upper_case_chars() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), COUPON_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (state, _) = test_state();
        let coupon = create_coupon(&state, create_request(15, None)).await.unwrap();
        assert!(coupon.is_active);
        assert_eq!(coupon.allowed_postal_codes, vec!["AB1 2CD".to_string()]);

        let all = list_coupons(&state).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].coupon_code, coupon.coupon_code);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_percentage() {
        let (state, _) = test_state();
        assert!(matches!(
            create_coupon(&state, create_request(0, None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_coupon(&state, create_request(101, None)).await,
            Err(AppError::Validation(_))
        ));

        let mut no_area = create_request(10, None);
        no_area.allowed_postal_codes.clear();
        assert!(matches!(
            create_coupon(&state, no_area).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_preview() {
        let (state, _) = test_state();
        let coupon = create_coupon(&state, create_request(25, None)).await.unwrap();

        let preview = preview_coupon(
            &state,
            ApplyCouponRequest {
                coupon_code: Some(coupon.coupon_code.to_lowercase()),
                price: None,
                postal_code: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(preview.discount_percentage, 25);
        assert!(preview.quote.is_none());

        let preview = preview_coupon(
            &state,
            ApplyCouponRequest {
                coupon_code: Some(coupon.coupon_code.clone()),
                price: Some(40.0),
                postal_code: Some("ab1 2cd".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(preview.quote.map(|q| q.final_price), Some(30.0));

        assert!(matches!(
            preview_coupon(
                &state,
                ApplyCouponRequest {
                    coupon_code: Some("ZZZZZZ".to_string()),
                    price: None,
                    postal_code: None,
                },
            )
            .await,
            Err(AppError::Pricing(PricingError::InvalidCoupon))
        ));
        assert!(matches!(
            preview_coupon(
                &state,
                ApplyCouponRequest {
                    coupon_code: None,
                    price: None,
                    postal_code: None,
                },
            )
            .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_deactivates_only_expired() {
        let (state, clock) = test_state();
        let expiring = create_coupon(&state, create_request(10, Some(noon() + Duration::hours(1))))
            .await
            .unwrap();
        create_coupon(&state, create_request(10, None)).await.unwrap();

        assert_eq!(sweep_expired(&state).await.unwrap(), 0);

        clock.set(noon() + Duration::hours(2));
        assert!(matches!(
            preview_coupon(
                &state,
                ApplyCouponRequest {
                    coupon_code: Some(expiring.coupon_code.clone()),
                    price: None,
                    postal_code: None,
                },
            )
            .await,
            Err(AppError::Pricing(PricingError::CouponExpired))
        ));

        assert_eq!(sweep_expired(&state).await.unwrap(), 1);
        let all = list_coupons(&state).await.unwrap();
        assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
        assert_eq!(sweep_expired(&state).await.unwrap(), 0);
    }
}
