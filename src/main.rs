use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use washbook::config::AppConfig;
use washbook::db::{self, Db};
use washbook::handlers;
use washbook::services::clock::SystemClock;
use washbook::services::coupons;
use washbook::services::notifications::webhook::WebhookNotifier;
use washbook::services::notifications::{LogNotifier, Notifier};
use washbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.auth_secret == "changeme" {
        tracing::warn!("AUTH_SECRET is not set, using the development default");
    }

    let conn = db::init_db(&config.database_url)?;

    let notifier: Arc<dyn Notifier> = if config.notify_webhook_url.is_empty() {
        tracing::info!("no NOTIFY_WEBHOOK_URL, booking events go to the log");
        Arc::new(LogNotifier)
    } else {
        tracing::info!(url = %config.notify_webhook_url, "sending booking events to webhook");
        Arc::new(WebhookNotifier::new(config.notify_webhook_url.clone()))
    };

    let state = Arc::new(AppState {
        db: Db::new(conn, config.storage_timeout),
        config: config.clone(),
        clock: Arc::new(SystemClock),
        notifier,
    });

    let sweeper_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweeper_state.config.coupon_sweep_interval);
        loop {
            interval.tick().await;
            if let Err(e) = coupons::sweep_expired(&sweeper_state).await {
                tracing::error!(error = %e, "coupon expiry sweep failed");
            }
        }
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
