use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    Address, Booking, BookingStatus, Coupon, Payment, PaymentMethod, PaymentStatus, Role,
    Service, User, WashHistory, WasherAvailability, WasherProfile,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_enum(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unexpected value: {value}").into(),
    )
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
        params![id],
        parse_user_row,
    )
    .optional()
}

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            user.id,
            user.name,
            user.email,
            user.role.as_str(),
            fmt_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role_str).ok_or_else(|| invalid_enum(3, &role_str))?,
        created_at: parse_ts(4, &created_at_str)?,
    })
}

/// Providers with their dispatch state. Providers that never had an
/// availability row are shown offline with `default_limit` remaining.
pub fn list_providers(conn: &Connection, default_limit: i64) -> rusqlite::Result<Vec<WasherProfile>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email,
                COALESCE(a.is_online, 0), COALESCE(a.is_busy, 0),
                COALESCE(a.daily_wash_limit, ?1)
         FROM users u
         LEFT JOIN washer_availability a ON a.provider_id = u.id
         WHERE u.role = 'provider'
         ORDER BY u.name ASC",
    )?;

    let rows = stmt.query_map(params![default_limit], |row| {
        Ok(WasherProfile {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            is_online: row.get(3)?,
            is_busy: row.get(4)?,
            daily_wash_limit: row.get(5)?,
        })
    })?;

    rows.collect()
}

// ── Washer Availability ──

pub fn get_availability(
    conn: &Connection,
    provider_id: &str,
) -> rusqlite::Result<Option<WasherAvailability>> {
    conn.query_row(
        "SELECT provider_id, is_online, is_busy, daily_wash_limit, updated_at
         FROM washer_availability WHERE provider_id = ?1",
        params![provider_id],
        |row| {
            let updated_at_str: String = row.get(4)?;
            Ok(WasherAvailability {
                provider_id: row.get(0)?,
                is_online: row.get(1)?,
                is_busy: row.get(2)?,
                daily_wash_limit: row.get(3)?,
                updated_at: parse_ts(4, &updated_at_str)?,
            })
        },
    )
    .optional()
}

pub fn insert_availability_if_missing(
    conn: &Connection,
    provider_id: &str,
    daily_wash_limit: i64,
    now: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO washer_availability (provider_id, is_online, is_busy, daily_wash_limit, updated_at)
         VALUES (?1, 0, 0, ?2, ?3)
         ON CONFLICT(provider_id) DO NOTHING",
        params![provider_id, daily_wash_limit, fmt_ts(now)],
    )?;
    Ok(())
}

/// Goes online only while quota remains. Returns false if nothing changed.
pub fn set_online_if_quota(
    conn: &Connection,
    provider_id: &str,
    now: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE washer_availability SET is_online = 1, updated_at = ?2
         WHERE provider_id = ?1 AND daily_wash_limit > 0",
        params![provider_id, fmt_ts(now)],
    )?;
    Ok(count > 0)
}

pub fn set_offline(conn: &Connection, provider_id: &str, now: &DateTime<Utc>) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE washer_availability SET is_online = 0, updated_at = ?2 WHERE provider_id = ?1",
        params![provider_id, fmt_ts(now)],
    )?;
    Ok(count > 0)
}

/// Compare-and-set reservation: succeeds only for an online, idle washer with
/// quota left, and takes one unit of quota in the same statement.
pub fn try_reserve(conn: &Connection, provider_id: &str, now: &DateTime<Utc>) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE washer_availability
         SET is_busy = 1, daily_wash_limit = daily_wash_limit - 1, updated_at = ?2
         WHERE provider_id = ?1 AND is_online = 1 AND is_busy = 0 AND daily_wash_limit > 0",
        params![provider_id, fmt_ts(now)],
    )?;
    Ok(count == 1)
}

/// Frees the washer; an exhausted washer also drops offline.
pub fn release(conn: &Connection, provider_id: &str, now: &DateTime<Utc>) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE washer_availability
         SET is_busy = 0,
             is_online = CASE WHEN daily_wash_limit <= 0 THEN 0 ELSE is_online END,
             updated_at = ?2
         WHERE provider_id = ?1",
        params![provider_id, fmt_ts(now)],
    )?;
    Ok(count > 0)
}

/// Overwrites a washer's remaining quota, leaving the online and busy flags
/// alone. Used by tests and operator tooling only; the daily reset job runs
/// outside this service and no request path calls this.
pub fn reset_daily_limit(
    conn: &Connection,
    provider_id: &str,
    daily_wash_limit: i64,
    now: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO washer_availability (provider_id, is_online, is_busy, daily_wash_limit, updated_at)
         VALUES (?1, 0, 0, ?2, ?3)
         ON CONFLICT(provider_id) DO UPDATE SET
           daily_wash_limit = excluded.daily_wash_limit,
           updated_at = excluded.updated_at",
        params![provider_id, daily_wash_limit, fmt_ts(now)],
    )?;
    Ok(())
}

// ── Services ──

pub fn get_service(conn: &Connection, id: &str) -> rusqlite::Result<Option<Service>> {
    conn.query_row(
        "SELECT id, provider_id, title, price, is_active FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok(Service {
                id: row.get(0)?,
                provider_id: row.get(1)?,
                title: row.get(2)?,
                price: row.get(3)?,
                is_active: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn insert_service(conn: &Connection, service: &Service) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO services (id, provider_id, title, price, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            service.id,
            service.provider_id,
            service.title,
            service.price,
            service.is_active,
        ],
    )?;
    Ok(())
}

// ── Coupons ──

const COUPON_COLUMNS: &str = "id, coupon_name, coupon_code, discount_percentage, is_active, \
                              expires_at, allowed_postal_codes, created_at, updated_at";

pub fn insert_coupon(conn: &Connection, coupon: &Coupon) -> rusqlite::Result<()> {
    let allowed = serde_json::to_string(&coupon.allowed_postal_codes)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO coupons (id, coupon_name, coupon_code, discount_percentage, is_active, expires_at, allowed_postal_codes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            coupon.id,
            coupon.coupon_name,
            coupon.coupon_code,
            coupon.discount_percentage,
            coupon.is_active,
            coupon.expires_at.as_ref().map(fmt_ts),
            allowed,
            fmt_ts(&coupon.created_at),
            fmt_ts(&coupon.updated_at),
        ],
    )?;
    Ok(())
}

/// Active coupon with this (already upper-cased) code, expired or not.
pub fn find_active_coupon(conn: &Connection, code: &str) -> rusqlite::Result<Option<Coupon>> {
    conn.query_row(
        &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE coupon_code = ?1 AND is_active = 1"),
        params![code],
        parse_coupon_row,
    )
    .optional()
}

pub fn list_coupons(conn: &Connection) -> rusqlite::Result<Vec<Coupon>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map([], parse_coupon_row)?;
    rows.collect()
}

pub fn deactivate_expired_coupons(conn: &Connection, now: &DateTime<Utc>) -> rusqlite::Result<usize> {
    let now = fmt_ts(now);
    conn.execute(
        "UPDATE coupons SET is_active = 0, updated_at = ?1
         WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at < ?1",
        params![now],
    )
}

fn parse_coupon_row(row: &Row) -> rusqlite::Result<Coupon> {
    let expires_at_str: Option<String> = row.get(5)?;
    let allowed_json: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let allowed_postal_codes: Vec<String> = serde_json::from_str(&allowed_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Coupon {
        id: row.get(0)?,
        coupon_name: row.get(1)?,
        coupon_code: row.get(2)?,
        discount_percentage: row.get(3)?,
        is_active: row.get(4)?,
        expires_at: expires_at_str.map(|s| parse_ts(5, &s)).transpose()?,
        allowed_postal_codes,
        created_at: parse_ts(7, &created_at_str)?,
        updated_at: parse_ts(8, &updated_at_str)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, provider_id, service_id, price, discount_price, \
                               final_price, coupon_id, address_line, latitude, longitude, \
                               booking_date, payment_method, payment_status, payment_trx_id, \
                               status, postal_code, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, provider_id, service_id, price, discount_price, final_price, coupon_id,
                               address_line, latitude, longitude, booking_date, payment_method, payment_status,
                               payment_trx_id, status, postal_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            booking.id,
            booking.customer_id,
            booking.provider_id,
            booking.service_id,
            booking.price,
            booking.discount_price,
            booking.final_price,
            booking.coupon_id,
            booking.address.address_line,
            booking.address.latitude,
            booking.address.longitude,
            fmt_ts(&booking.booking_date),
            booking.payment.method.as_str(),
            booking.payment.status.as_str(),
            booking.payment.trx_id,
            booking.status.as_str(),
            booking.postal_code,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    )
    .optional()
}

pub fn list_bookings_for_customer(conn: &Connection, customer_id: &str) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![customer_id], parse_booking_row)?;
    rows.collect()
}

pub fn list_bookings_for_provider(conn: &Connection, provider_id: &str) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE provider_id = ?1 ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![provider_id], parse_booking_row)?;
    rows.collect()
}

/// Conditional status write: only applies while the booking is still in
/// `from`. Returns false if another writer got there first.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    now: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), fmt_ts(now)],
    )?;
    Ok(count == 1)
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let booking_date_str: String = row.get(11)?;
    let method_str: String = row.get(12)?;
    let payment_status_str: String = row.get(13)?;
    let status_str: String = row.get(15)?;
    let created_at_str: String = row.get(17)?;
    let updated_at_str: String = row.get(18)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        provider_id: row.get(2)?,
        service_id: row.get(3)?,
        price: row.get(4)?,
        discount_price: row.get(5)?,
        final_price: row.get(6)?,
        coupon_id: row.get(7)?,
        address: Address {
            address_line: row.get(8)?,
            latitude: row.get(9)?,
            longitude: row.get(10)?,
        },
        booking_date: parse_ts(11, &booking_date_str)?,
        payment: Payment {
            method: PaymentMethod::parse(&method_str).ok_or_else(|| invalid_enum(12, &method_str))?,
            status: PaymentStatus::parse(&payment_status_str)
                .ok_or_else(|| invalid_enum(13, &payment_status_str))?,
            trx_id: row.get(14)?,
        },
        status: BookingStatus::parse(&status_str).ok_or_else(|| invalid_enum(15, &status_str))?,
        postal_code: row.get(16)?,
        created_at: parse_ts(17, &created_at_str)?,
        updated_at: parse_ts(18, &updated_at_str)?,
    })
}

// ── Wash History ──

pub fn insert_wash_history(conn: &Connection, entry: &WashHistory) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO wash_history (id, washer_id, booking_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.id,
            entry.washer_id,
            entry.booking_id,
            fmt_ts(&entry.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_wash_history(conn: &Connection, washer_id: &str) -> rusqlite::Result<Vec<WashHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, washer_id, booking_id, created_at FROM wash_history
         WHERE washer_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![washer_id], |row| {
        let created_at_str: String = row.get(3)?;
        Ok(WashHistory {
            id: row.get(0)?,
            washer_id: row.get(1)?,
            booking_id: row.get(2)?,
            created_at: parse_ts(3, &created_at_str)?,
        })
    })?;
    rows.collect()
}
