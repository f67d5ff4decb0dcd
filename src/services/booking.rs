//! Booking lifecycle.
//!
//! Each operation that touches both a booking and its washer runs as one
//! storage transaction, so a failure part way leaves neither changed.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingDetail, BookingStatus, CreateBookingRequest, NewBooking, Role, ServiceSummary,
    User, UserSummary, WashHistory,
};
use crate::services::notifications::{self, BookingEvent, BookingEventKind};
use crate::services::{availability, history, pricing};
use crate::state::AppState;

/// Validates, prices and stores a new booking as `pending`.
///
/// The washer is only checked, not reserved; reservation happens on accept.
pub async fn create_booking(
    state: &AppState,
    customer_id: &str,
    request: CreateBookingRequest,
) -> Result<Booking, AppError> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required booking fields: {}",
            missing.join(", ")
        )));
    }

    let new = request
        .into_new_booking()
        .ok_or_else(|| AppError::Validation("Missing required booking fields".to_string()))?;
    new.validate_all()?;

    let now = state.clock.now().trunc_subsecs(0);
    let default_limit = state.config.default_daily_wash_limit;
    let customer_id = customer_id.to_string();

    let booking = state
        .db
        .call(move |conn| insert_priced_booking(conn, &customer_id, new, default_limit, now))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        provider_id = %booking.provider_id,
        final_price = booking.final_price,
        "booking created"
    );
    notifications::dispatch(
        &state.notifier,
        BookingEvent::new(BookingEventKind::Created, &booking, now),
    );

    Ok(booking)
}

fn insert_priced_booking(
    conn: &mut Connection,
    customer_id: &str,
    new: NewBooking,
    default_limit: i64,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;

    availability::check_bookable(&tx, &new.provider_id, default_limit, &now)?;

    if queries::get_service(&tx, &new.service_id)?.is_none() {
        return Err(AppError::NotFound("Service".to_string()));
    }

    let coupon = match new.coupon_code.as_deref() {
        Some(code) => queries::find_active_coupon(&tx, &pricing::normalize_coupon_code(code))?,
        None => None,
    };
    let quote = pricing::quote(
        new.price,
        new.coupon_code.as_deref(),
        coupon.as_ref(),
        &new.postal_code,
        now,
    )?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        provider_id: new.provider_id,
        service_id: new.service_id,
        price: quote.price,
        discount_price: quote.discount,
        final_price: quote.final_price,
        coupon_id: quote.applied_coupon_id,
        address: new.address,
        booking_date: new.booking_date.trunc_subsecs(0),
        payment: new.payment,
        status: BookingStatus::Pending,
        postal_code: pricing::normalize_postal_code(&new.postal_code),
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    Ok(booking)
}

/// Booking with its parties resolved. Visible to the customer, the assigned
/// washer and admins.
pub async fn get_booking_detail(
    state: &AppState,
    booking_id: &str,
    viewer: &User,
) -> Result<BookingDetail, AppError> {
    let id = booking_id.to_string();
    let detail = state
        .db
        .call(move |conn| {
            let booking = queries::get_booking(conn, &id)?.ok_or(AppError::BookingNotFound)?;
            let customer = queries::get_user(conn, &booking.customer_id)?;
            let provider = queries::get_user(conn, &booking.provider_id)?;
            let service = queries::get_service(conn, &booking.service_id)?;
            Ok(BookingDetail {
                customer: customer.as_ref().map(UserSummary::from),
                provider: provider.as_ref().map(UserSummary::from),
                service: service.as_ref().map(ServiceSummary::from),
                booking,
            })
        })
        .await?;

    let booking = &detail.booking;
    let allowed = viewer.role == Role::Admin
        || booking.customer_id == viewer.id
        || booking.provider_id == viewer.id;
    if !allowed {
        return Err(AppError::Forbidden(
            "You are not allowed to view this booking".to_string(),
        ));
    }

    Ok(detail)
}

pub async fn list_customer_bookings(state: &AppState, customer_id: &str) -> Result<Vec<Booking>, AppError> {
    let id = customer_id.to_string();
    state
        .db
        .call(move |conn| Ok(queries::list_bookings_for_customer(conn, &id)?))
        .await
}

pub async fn list_provider_bookings(state: &AppState, provider_id: &str) -> Result<Vec<Booking>, AppError> {
    let id = provider_id.to_string();
    state
        .db
        .call(move |conn| Ok(queries::list_bookings_for_provider(conn, &id)?))
        .await
}

/// Administrative status change. `pending` is never a valid target.
pub async fn update_status(
    state: &AppState,
    booking_id: &str,
    status: Option<&str>,
) -> Result<Booking, AppError> {
    let target = status
        .and_then(BookingStatus::parse)
        .filter(|s| *s != BookingStatus::Pending)
        .ok_or(AppError::InvalidStatus)?;

    let now = state.clock.now();
    let id = booking_id.to_string();
    let booking = state
        .db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let booking = queries::get_booking(&tx, &id)?.ok_or(AppError::BookingNotFound)?;
            let updated = apply_transition(&tx, booking, target, &now)?;
            tx.commit()?;
            Ok(updated)
        })
        .await?;

    tracing::info!(booking_id, status = %booking.status, "booking status updated");
    notifications::dispatch(
        &state.notifier,
        BookingEvent::new(BookingEventKind::StatusChanged, &booking, now),
    );

    Ok(booking)
}

/// Customer cancellation. Another customer's booking reads as not found.
pub async fn cancel_booking(
    state: &AppState,
    booking_id: &str,
    customer_id: &str,
) -> Result<Booking, AppError> {
    let now = state.clock.now();
    let id = booking_id.to_string();
    let customer = customer_id.to_string();
    let booking = state
        .db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let booking = queries::get_booking(&tx, &id)?
                .filter(|b| b.customer_id == customer)
                .ok_or(AppError::BookingNotFound)?;
            let updated = apply_transition(&tx, booking, BookingStatus::Cancelled, &now)?;
            tx.commit()?;
            Ok(updated)
        })
        .await?;

    tracing::info!(booking_id, "booking cancelled");
    notifications::dispatch(
        &state.notifier,
        BookingEvent::new(BookingEventKind::Cancelled, &booking, now),
    );

    Ok(booking)
}

/// Washer accepts a booking and the wash starts: the washer is reserved and
/// the booking moves to `ongoing` in one step.
pub async fn accept_booking(
    state: &AppState,
    booking_id: &str,
    washer_id: &str,
) -> Result<Booking, AppError> {
    let now = state.clock.now();
    let default_limit = state.config.default_daily_wash_limit;
    let id = booking_id.to_string();
    let washer = washer_id.to_string();

    let booking = state
        .db
        .call(move |conn| start_wash(conn, &id, &washer, default_limit, &now))
        .await?;

    tracing::info!(booking_id, washer_id, "wash started");
    notifications::dispatch(
        &state.notifier,
        BookingEvent::new(BookingEventKind::Accepted, &booking, now),
    );

    Ok(booking)
}

fn start_wash(
    conn: &mut Connection,
    booking_id: &str,
    washer_id: &str,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking(&tx, booking_id)?.ok_or(AppError::BookingNotFound)?;
    if booking.provider_id != washer_id {
        return Err(AppError::Forbidden(
            "Booking is assigned to another washer".to_string(),
        ));
    }

    match availability::reserve(&tx, washer_id, default_limit, now) {
        Ok(_) => {}
        Err(AppError::QuotaExhausted) => {
            // keep the forced-offline write
            tx.commit()?;
            return Err(AppError::QuotaExhausted);
        }
        Err(e) => return Err(e),
    }

    if !booking.status.can_start_wash() {
        return Err(AppError::IllegalTransition {
            from: booking.status,
            to: BookingStatus::Ongoing,
        });
    }
    if !queries::transition_booking(&tx, booking_id, booking.status, BookingStatus::Ongoing, now)? {
        return Err(booking_changed());
    }

    tx.commit()?;
    Ok(Booking {
        status: BookingStatus::Ongoing,
        updated_at: *now,
        ..booking
    })
}

/// Finishes an ongoing wash: completes the booking, frees the washer and
/// appends a history entry, all or nothing.
pub async fn complete_booking(
    state: &AppState,
    booking_id: &str,
    washer_id: &str,
) -> Result<(Booking, WashHistory), AppError> {
    let now = state.clock.now();
    let default_limit = state.config.default_daily_wash_limit;
    let strict = state.config.strict_completion_ownership;
    let id = booking_id.to_string();
    let washer = washer_id.to_string();

    let (booking, entry) = state
        .db
        .call(move |conn| finish_wash(conn, &id, &washer, strict, default_limit, &now))
        .await?;

    tracing::info!(booking_id, washer_id, "wash completed");
    notifications::dispatch(
        &state.notifier,
        BookingEvent::new(BookingEventKind::Completed, &booking, now),
    );

    Ok((booking, entry))
}

fn finish_wash(
    conn: &mut Connection,
    booking_id: &str,
    washer_id: &str,
    strict_ownership: bool,
    default_limit: i64,
    now: &DateTime<Utc>,
) -> Result<(Booking, WashHistory), AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking(&tx, booking_id)?.ok_or(AppError::BookingNotFound)?;
    if strict_ownership && booking.provider_id != washer_id {
        return Err(AppError::Forbidden(
            "Booking is assigned to another washer".to_string(),
        ));
    }
    match booking.status {
        BookingStatus::Ongoing => {}
        BookingStatus::Completed => return Err(AppError::AlreadyCompleted),
        from => {
            return Err(AppError::IllegalTransition {
                from,
                to: BookingStatus::Completed,
            })
        }
    }

    if !queries::transition_booking(
        &tx,
        booking_id,
        BookingStatus::Ongoing,
        BookingStatus::Completed,
        now,
    )? {
        return Err(booking_changed());
    }
    availability::release(&tx, washer_id, default_limit, now)?;
    let entry = history::record(&tx, washer_id, booking_id, now)?;

    tx.commit()?;
    Ok((
        Booking {
            status: BookingStatus::Completed,
            updated_at: *now,
            ..booking
        },
        entry,
    ))
}

/// Checks the transition table and writes the new status if the booking is
/// still where it was read.
fn apply_transition(
    conn: &Connection,
    booking: Booking,
    target: BookingStatus,
    now: &DateTime<Utc>,
) -> Result<Booking, AppError> {
    if booking.status.is_terminal() {
        return Err(match booking.status {
            BookingStatus::Completed => AppError::AlreadyCompleted,
            from => AppError::IllegalTransition { from, to: target },
        });
    }
    if !booking.status.can_transition_to(target) {
        return Err(AppError::IllegalTransition {
            from: booking.status,
            to: target,
        });
    }
    if !queries::transition_booking(conn, &booking.id, booking.status, target, now)? {
        return Err(booking_changed());
    }

    Ok(Booking {
        status: target,
        updated_at: *now,
        ..booking
    })
}

fn booking_changed() -> AppError {
    AppError::Conflict("Booking was modified by another request, please retry".to_string())
}
