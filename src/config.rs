use std::env;
use std::time::Duration;

use crate::models::WorkingHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub auth_secret: String,
    pub notify_webhook_url: String,
    pub working_hours: WorkingHours,
    pub default_daily_wash_limit: i64,
    /// When set, only the washer assigned to a booking may complete it.
    pub strict_completion_ownership: bool,
    pub storage_timeout: Duration,
    pub coupon_sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let utc_offset_minutes = env::var("UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let start = env::var("WORKING_HOURS_START").unwrap_or_else(|_| "08:00".to_string());
        let end = env::var("WORKING_HOURS_END").unwrap_or_else(|_| "17:30".to_string());
        let working_hours = WorkingHours::parse(&start, &end, utc_offset_minutes)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid working hours, using 08:00-17:30");
                WorkingHours {
                    utc_offset_minutes,
                    ..WorkingHours::default()
                }
            });

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "washbook.db".to_string()),
            auth_secret: env::var("AUTH_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            working_hours,
            default_daily_wash_limit: env::var("DEFAULT_DAILY_WASH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|limit: &i64| *limit >= 0)
                .unwrap_or(5),
            strict_completion_ownership: env::var("STRICT_COMPLETION_OWNERSHIP")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            storage_timeout: Duration::from_millis(
                env::var("STORAGE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
            coupon_sweep_interval: Duration::from_secs(
                env::var("COUPON_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .unwrap_or(3600),
            ),
        }
    }
}
