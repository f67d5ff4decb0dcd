//! Washer availability tracker.
//!
//! Owns the `washer_availability` aggregate. Every write goes through a
//! conditional update in [`queries`], so two processes sharing the database
//! cannot both reserve the same washer.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{WasherAvailability, WasherProfile, WorkingHours};
use crate::state::AppState;

/// Resolves a provider and their availability row, creating the row with
/// `default_limit` on first use.
pub fn load_provider(
    conn: &Connection,
    provider_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    let user = queries::get_user(conn, provider_id)?;
    if !user.map(|u| u.is_provider()).unwrap_or(false) {
        return Err(AppError::ProviderNotFound);
    }

    queries::insert_availability_if_missing(conn, provider_id, default_limit, now)?;
    queries::get_availability(conn, provider_id)?
        .ok_or_else(|| AppError::Internal(format!("availability row missing for {provider_id}")))
}

/// Booking-time check mirroring the washer's current flags. Reserves nothing:
/// the real reservation happens on accept.
pub fn check_bookable(
    conn: &Connection,
    provider_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    let availability = load_provider(conn, provider_id, default_limit, now)?;
    if !availability.is_online {
        return Err(AppError::ProviderOffline);
    }
    if availability.is_busy {
        return Err(AppError::ProviderBusy);
    }
    if availability.daily_wash_limit <= 0 {
        return Err(AppError::QuotaExhausted);
    }
    Ok(availability)
}

pub fn set_online(
    conn: &Connection,
    provider_id: &str,
    hours: &WorkingHours,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    load_provider(conn, provider_id, default_limit, now)?;

    if !hours.contains(*now) {
        return Err(AppError::OutsideWorkingHours {
            hours: hours.to_human_readable(),
        });
    }

    if !queries::set_online_if_quota(conn, provider_id, now)? {
        return Err(AppError::QuotaExhausted);
    }

    refreshed(conn, provider_id)
}

pub fn set_offline(
    conn: &Connection,
    provider_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    load_provider(conn, provider_id, default_limit, now)?;
    queries::set_offline(conn, provider_id, now)?;
    refreshed(conn, provider_id)
}

/// Marks the washer busy and takes one unit of daily quota, atomically.
///
/// An exhausted washer is forced offline before `QuotaExhausted` is returned;
/// callers running inside a transaction must commit to keep that change.
pub fn reserve(
    conn: &Connection,
    provider_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    load_provider(conn, provider_id, default_limit, now)?;

    if queries::try_reserve(conn, provider_id, now)? {
        return refreshed(conn, provider_id);
    }

    let current = refreshed(conn, provider_id)?;
    if !current.is_online {
        Err(AppError::ProviderOffline)
    } else if current.is_busy {
        Err(AppError::ProviderBusy)
    } else if current.daily_wash_limit <= 0 {
        queries::set_offline(conn, provider_id, now)?;
        tracing::warn!(provider_id, "daily wash limit exhausted, washer forced offline");
        Err(AppError::QuotaExhausted)
    } else {
        Err(AppError::Conflict(
            "Washer availability changed, please retry".to_string(),
        ))
    }
}

/// Clears the busy flag; an exhausted washer also goes offline.
pub fn release(
    conn: &Connection,
    provider_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<WasherAvailability, AppError> {
    load_provider(conn, provider_id, default_limit, now)?;
    queries::release(conn, provider_id, now)?;
    let availability = refreshed(conn, provider_id)?;
    if !availability.is_online && availability.daily_wash_limit <= 0 {
        tracing::info!(provider_id, "washer reached daily limit, now offline");
    }
    Ok(availability)
}

fn refreshed(conn: &Connection, provider_id: &str) -> Result<WasherAvailability, AppError> {
    queries::get_availability(conn, provider_id)?
        .ok_or_else(|| AppError::Internal(format!("availability row missing for {provider_id}")))
}

// ── Async entry points ──

pub async fn go_online(state: &AppState, provider_id: &str) -> Result<WasherAvailability, AppError> {
    let now = state.clock.now();
    let hours = state.config.working_hours;
    let default_limit = state.config.default_daily_wash_limit;
    let id = provider_id.to_string();

    let availability = state
        .db
        .call(move |conn| set_online(conn, &id, &hours, default_limit, &now))
        .await?;

    tracing::info!(provider_id, remaining = availability.daily_wash_limit, "washer online");
    Ok(availability)
}

pub async fn go_offline(state: &AppState, provider_id: &str) -> Result<WasherAvailability, AppError> {
    let now = state.clock.now();
    let default_limit = state.config.default_daily_wash_limit;
    let id = provider_id.to_string();

    let availability = state
        .db
        .call(move |conn| set_offline(conn, &id, default_limit, &now))
        .await?;

    tracing::info!(provider_id, "washer offline");
    Ok(availability)
}

pub async fn status(state: &AppState, provider_id: &str) -> Result<WasherAvailability, AppError> {
    let now = state.clock.now();
    let default_limit = state.config.default_daily_wash_limit;
    let id = provider_id.to_string();

    state
        .db
        .call(move |conn| load_provider(conn, &id, default_limit, &now))
        .await
}

pub async fn list_washers(state: &AppState) -> Result<Vec<WasherProfile>, AppError> {
    let default_limit = state.config.default_daily_wash_limit;
    state
        .db
        .call(move |conn| Ok(queries::list_providers(conn, default_limit)?))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Role, User};
    use chrono::NaiveDateTime;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    fn add_user(conn: &Connection, id: &str, role: Role) {
        queries::insert_user(
            conn,
            &User {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{id}@example.com"),
                role,
                created_at: Utc::now(),
            },
        )
        .unwrap();
    }

    fn online_washer(conn: &Connection, id: &str, limit: i64) {
        add_user(conn, id, Role::Provider);
        let now = at("2025-06-16 09:00");
        queries::reset_daily_limit(conn, id, limit, &now).unwrap();
        set_online(conn, id, &WorkingHours::default(), 5, &now).unwrap();
    }

    #[test]
    fn test_first_lookup_creates_default_row() {
        let conn = setup_db();
        add_user(&conn, "w1", Role::Provider);
        let a = load_provider(&conn, "w1", 7, &Utc::now()).unwrap();
        assert!(!a.is_online);
        assert!(!a.is_busy);
        assert_eq!(a.daily_wash_limit, 7);
    }

    #[test]
    fn test_non_provider_is_not_found() {
        let conn = setup_db();
        add_user(&conn, "c1", Role::User);
        assert!(matches!(
            load_provider(&conn, "c1", 5, &Utc::now()),
            Err(AppError::ProviderNotFound)
        ));
        assert!(matches!(
            load_provider(&conn, "ghost", 5, &Utc::now()),
            Err(AppError::ProviderNotFound)
        ));
    }

    #[test]
    fn test_set_online_outside_working_hours() {
        let conn = setup_db();
        add_user(&conn, "w1", Role::Provider);
        let result = set_online(&conn, "w1", &WorkingHours::default(), 5, &at("2025-06-16 18:00"));
        assert!(matches!(result, Err(AppError::OutsideWorkingHours { .. })));
        assert!(!queries::get_availability(&conn, "w1").unwrap().unwrap().is_online);
    }

    #[test]
    fn test_set_online_with_no_quota() {
        let conn = setup_db();
        add_user(&conn, "w1", Role::Provider);
        let now = at("2025-06-16 10:00");
        queries::reset_daily_limit(&conn, "w1", 0, &now).unwrap();

        let result = set_online(&conn, "w1", &WorkingHours::default(), 5, &now);
        assert!(matches!(result, Err(AppError::QuotaExhausted)));
        assert!(!queries::get_availability(&conn, "w1").unwrap().unwrap().is_online);
    }

    #[test]
    fn test_set_offline_is_unconditional() {
        let conn = setup_db();
        online_washer(&conn, "w1", 3);
        let a = set_offline(&conn, "w1", 5, &at("2025-06-16 22:00")).unwrap();
        assert!(!a.is_online);
    }

    #[test]
    fn test_limit_reset_keeps_flags() {
        let conn = setup_db();
        online_washer(&conn, "w1", 1);
        reserve(&conn, "w1", 5, &Utc::now()).unwrap();

        queries::reset_daily_limit(&conn, "w1", 4, &Utc::now()).unwrap();
        let a = queries::get_availability(&conn, "w1").unwrap().unwrap();
        assert!(a.is_online);
        assert!(a.is_busy);
        assert_eq!(a.daily_wash_limit, 4);
    }

    #[test]
    fn test_reserve_takes_quota_and_marks_busy() {
        let conn = setup_db();
        online_washer(&conn, "w1", 2);
        let a = reserve(&conn, "w1", 5, &Utc::now()).unwrap();
        assert!(a.is_busy);
        assert_eq!(a.daily_wash_limit, 1);
    }

    #[test]
    fn test_reserve_twice_is_busy() {
        let conn = setup_db();
        online_washer(&conn, "w1", 3);
        reserve(&conn, "w1", 5, &Utc::now()).unwrap();
        assert!(matches!(
            reserve(&conn, "w1", 5, &Utc::now()),
            Err(AppError::ProviderBusy)
        ));
        let a = queries::get_availability(&conn, "w1").unwrap().unwrap();
        assert_eq!(a.daily_wash_limit, 2);
    }

    #[test]
    fn test_reserve_offline_washer() {
        let conn = setup_db();
        add_user(&conn, "w1", Role::Provider);
        assert!(matches!(
            reserve(&conn, "w1", 5, &Utc::now()),
            Err(AppError::ProviderOffline)
        ));
    }

    #[test]
    fn test_reserve_with_stale_online_flag_forces_offline() {
        let conn = setup_db();
        online_washer(&conn, "w1", 3);
        queries::reset_daily_limit(&conn, "w1", 0, &Utc::now()).unwrap();

        assert!(matches!(
            reserve(&conn, "w1", 5, &Utc::now()),
            Err(AppError::QuotaExhausted)
        ));
        let a = queries::get_availability(&conn, "w1").unwrap().unwrap();
        assert!(!a.is_online);
        assert!(!a.is_busy);
        assert_eq!(a.daily_wash_limit, 0);
    }

    #[test]
    fn test_release_keeps_online_with_quota_left() {
        let conn = setup_db();
        online_washer(&conn, "w1", 2);
        reserve(&conn, "w1", 5, &Utc::now()).unwrap();
        let a = release(&conn, "w1", 5, &Utc::now()).unwrap();
        assert!(!a.is_busy);
        assert!(a.is_online);
    }

    #[test]
    fn test_release_after_last_wash_goes_offline() {
        let conn = setup_db();
        online_washer(&conn, "w1", 1);
        let a = reserve(&conn, "w1", 5, &Utc::now()).unwrap();
        assert_eq!(a.daily_wash_limit, 0);
        assert!(a.is_busy);

        let a = release(&conn, "w1", 5, &Utc::now()).unwrap();
        assert!(!a.is_busy);
        assert!(!a.is_online);
    }

    #[test]
    fn test_limit_never_goes_negative() {
        let conn = setup_db();
        online_washer(&conn, "w1", 2);
        let mut previous = 2;
        for _ in 0..5 {
            let _ = reserve(&conn, "w1", 5, &Utc::now());
            let _ = release(&conn, "w1", 5, &Utc::now());
            let a = queries::get_availability(&conn, "w1").unwrap().unwrap();
            assert!(a.daily_wash_limit >= 0);
            assert!(a.daily_wash_limit <= previous);
            previous = a.daily_wash_limit;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_check_bookable_mirrors_flags() {
        let conn = setup_db();
        add_user(&conn, "w1", Role::Provider);
        assert!(matches!(
            check_bookable(&conn, "w1", 5, &Utc::now()),
            Err(AppError::ProviderOffline)
        ));

        online_washer(&conn, "w2", 1);
        assert!(check_bookable(&conn, "w2", 5, &Utc::now()).is_ok());
        reserve(&conn, "w2", 5, &Utc::now()).unwrap();
        assert!(matches!(
            check_bookable(&conn, "w2", 5, &Utc::now()),
            Err(AppError::ProviderBusy)
        ));

        // Pre-check does not reserve anything
        online_washer(&conn, "w3", 1);
        check_bookable(&conn, "w3", 5, &Utc::now()).unwrap();
        let a = queries::get_availability(&conn, "w3").unwrap().unwrap();
        assert_eq!(a.daily_wash_limit, 1);
        assert!(!a.is_busy);
    }
}
