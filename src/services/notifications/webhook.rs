use anyhow::Context;
use async_trait::async_trait;

use super::{BookingEvent, Notifier};

/// Posts each booking event as JSON to a fixed URL.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .context("failed to send booking webhook")?
            .error_for_status()
            .context("booking webhook returned error")?;

        Ok(())
    }
}
