//! Discord webhook forwarding for push notifications.
//!
//! [`WebhookForwarder`] turns a [`PushEvent`] into a single Discord embed
//! (title = notification title, description = notification body) and
//! POSTs it as JSON. Dismissal pushes are skipped. Failures are reported
//! to the caller of [`forward`](WebhookForwarder::forward); the stream
//! handler built by [`into_handler`](WebhookForwarder::into_handler)
//! only logs them. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use pushrelay_stream::{Handler, PushEvent, PushMessage};
use serde::Serialize;

/// Embed accent color (Pushbullet-ish light blue).
pub const EMBED_COLOR: u32 = 0x00acee;

/// Default timeout for a single webhook request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Body of a Discord "execute webhook" request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

/// A single Discord embed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub color: u32,
    pub title: String,
    pub description: String,
}

impl WebhookPayload {
    pub fn from_push(push: &PushMessage) -> Self {
        Self {
            embeds: vec![Embed {
                color: EMBED_COLOR,
                title: push.title.clone(),
                description: push.body.clone(),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Outcome of a successful [`WebhookForwarder::forward`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// The webhook accepted the payload.
    Sent,
    /// The push was a dismissal; no request was made.
    Skipped,
}

// ---------------------------------------------------------------------------
// WebhookForwarder
// ---------------------------------------------------------------------------

/// Posts push notifications to one Discord webhook URL.
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: String,
}

impl WebhookForwarder {
    /// Create a forwarder with its own HTTP client using `timeout` per request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(WebhookError::ClientBuild)?;
        Ok(Self::with_client(client, url))
    }

    /// Create a forwarder around an existing HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Forward one push event to the webhook.
    pub async fn forward(&self, event: &PushEvent) -> Result<Forwarded, WebhookError> {
        if event.push.is_dismissal() {
            tracing::debug!(
                package_name = %event.push.package_name,
                "Skipping dismissal push",
            );
            return Ok(Forwarded::Skipped);
        }

        let payload = WebhookPayload::from_push(&event.push);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            application_name = %event.push.application_name,
            status = status.as_u16(),
            "Forwarded push to webhook",
        );
        Ok(Forwarded::Sent)
    }

    /// Adapt the forwarder into a push handler for the stream client.
    ///
    /// Delivery failures are logged and dropped.
    pub fn into_handler(self: Arc<Self>) -> Handler {
        Handler::push(move |event| {
            let forwarder = Arc::clone(&self);
            async move {
                if let Err(e) = forwarder.forward(&event).await {
                    tracing::error!(
                        error = %e,
                        application_name = %event.push.application_name,
                        "Webhook delivery failed",
                    );
                }
            }
        })
    }
}

impl std::fmt::Debug for WebhookForwarder {
    // The webhook URL embeds its secret token.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookForwarder").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
