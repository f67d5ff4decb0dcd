pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Accepted,
    StatusChanged,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub status: BookingStatus,
    pub final_price: f64,
    pub occurred_at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn new(kind: BookingEventKind, booking: &Booking, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            booking_id: booking.id.clone(),
            customer_id: booking.customer_id.clone(),
            provider_id: booking.provider_id.clone(),
            status: booking.status,
            final_price: booking.final_price,
            occurred_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Writes events to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::info!(
            kind = ?event.kind,
            booking_id = %event.booking_id,
            status = %event.status,
            "booking event"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery. A failed notification never affects the
/// operation that produced it.
pub fn dispatch(notifier: &Arc<dyn Notifier>, event: BookingEvent) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            tracing::warn!(booking_id = %event.booking_id, error = %e, "failed to deliver booking event");
        }
    });
}
