//! Two-phase frame decoder.
//!
//! A stream frame is one flat JSON object holding both the type tag and
//! the type-specific fields, so the tag is read first (into an
//! [`Envelope`]) and the same text is then decoded a second time into
//! the structure the tag selects.

use crate::messages::{Envelope, EventKind, NopEvent, PushEvent, StreamEvent, TickleEvent};

/// Errors produced while decoding a single text frame.
///
/// Both are recoverable: the frame is dropped and the stream continues.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not JSON or has no string `type` field.
    #[error("Failed to decode frame envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The `type` was recognised but the body does not match its shape.
    #[error("Failed to decode {kind} frame: {source}")]
    Body {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a text frame into a typed event.
///
/// Returns `Ok(None)` for frames whose `type` is not a known
/// [`EventKind`]; those are valid on the wire and simply not dispatched.
pub fn decode_frame(text: &str) -> Result<Option<StreamEvent>, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;

    let kind = match envelope.kind.parse::<EventKind>() {
        Ok(kind) => kind,
        Err(_) => {
            tracing::debug!(kind = %envelope.kind, "Ignoring frame of unknown kind");
            return Ok(None);
        }
    };

    let body_err = |source| DecodeError::Body { kind, source };
    let event = match kind {
        EventKind::Push => StreamEvent::Push(serde_json::from_str::<PushEvent>(text).map_err(body_err)?),
        EventKind::Tickle => {
            StreamEvent::Tickle(serde_json::from_str::<TickleEvent>(text).map_err(body_err)?)
        }
        EventKind::Nop => StreamEvent::Nop(serde_json::from_str::<NopEvent>(text).map_err(body_err)?),
    };

    Ok(Some(event))
}
