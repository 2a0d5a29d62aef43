//! `pushrelay` library crate.
//!
//! Wires the Pushbullet stream client to the Discord webhook forwarder.
//! The binary entrypoint lives in `main.rs`; the wiring is exposed here
//! for integration testing.

pub mod config;

use std::sync::Arc;

use pushrelay_delivery::{WebhookError, WebhookForwarder};
use pushrelay_stream::{DispatcherConfig, HandlerRegistry, StreamClient, StreamConfig};

use crate::config::RelayConfig;

/// Build a stream client with the webhook forwarder registered for pushes.
///
/// The connection is not opened.
pub async fn build_client(config: &RelayConfig) -> Result<StreamClient, WebhookError> {
    let forwarder = Arc::new(WebhookForwarder::new(
        config.discord_webhook.clone(),
        config.webhook_timeout,
    )?);

    let registry = Arc::new(HandlerRegistry::new());
    registry.register(forwarder.into_handler()).await;

    let stream_config =
        StreamConfig::new(config.pushbullet_token.clone()).with_endpoint(config.stream_endpoint.clone());

    Ok(StreamClient::with_registry(
        stream_config,
        registry,
        DispatcherConfig {
            max_in_flight: config.max_in_flight,
        },
    ))
}
