//! Outbound delivery of stream events.
//!
//! - [`webhook`]: forwards push notifications to a Discord webhook as a
//!   single embed.

pub mod webhook;

pub use webhook::{Embed, Forwarded, WebhookError, WebhookForwarder, WebhookPayload};
