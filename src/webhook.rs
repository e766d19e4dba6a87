//! Best-effort webhook dispatch for evidence records.
//!
//! Fire-and-forget: each record is POSTed as JSON on a spawned task with a
//! short timeout. Failures are logged and dropped — the JSONL evidence log
//! is the primary audit trail, the webhook is a convenience feed.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn, Instrument};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    /// Build a dispatcher when a webhook URL is configured.
    pub fn from_url(url: Option<&str>) -> Option<Self> {
        let url = url?.to_string();
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .ok()?;
        info!(url = %url, "evidence webhook enabled");
        Some(Self { client, url })
    }

    /// POST one record without blocking the pipeline.
    pub fn dispatch<T: Serialize>(&self, record: &T) {
        let Ok(body) = serde_json::to_value(record) else {
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        // Carry the caller's span so delivery failures keep the run context.
        tokio::spawn(
            async move {
                match client.post(&url).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        warn!(url = %url, status = %response.status(), "webhook delivery rejected");
                    }
                    Err(e) => {
                        warn!(url = %url, "webhook delivery failed: {e}");
                    }
                }
            }
            .instrument(tracing::Span::current()),
        );
    }
}
