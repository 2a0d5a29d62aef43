//! Pushbullet stream event types.
//!
//! The realtime stream sends flat JSON objects whose `"type"` field
//! selects the shape of the rest of the object, e.g.
//! `{"type":"push","push":{...}}` or `{"type":"tickle","subtype":"push"}`.
//! This module defines the envelope used to read that field and the
//! strongly-typed event variants handed to consumers.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Wire name of push events.
pub const KIND_PUSH: &str = "push";
/// Wire name of tickle events.
pub const KIND_TICKLE: &str = "tickle";
/// Wire name of heartbeat events.
pub const KIND_NOP: &str = "nop";

/// Push subtype sent when a mirrored notification is dismissed on the phone.
pub const PUSH_TYPE_DISMISSAL: &str = "dismissal";

/// Minimal view of a frame: only the discriminant.
///
/// Decoded first so the decoder knows which full structure to decode the
/// same bytes into. Never handed to consumers.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
}

/// All event kinds this client knows how to decode and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    Tickle,
    Nop,
}

impl EventKind {
    /// Every known kind, in a stable order.
    pub const ALL: [EventKind; 3] = [EventKind::Push, EventKind::Tickle, EventKind::Nop];

    /// The discriminant value used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Push => KIND_PUSH,
            EventKind::Tickle => KIND_TICKLE,
            EventKind::Nop => KIND_NOP,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a discriminant names no known [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            KIND_PUSH => Ok(EventKind::Push),
            KIND_TICKLE => Ok(EventKind::Tickle),
            KIND_NOP => Ok(EventKind::Nop),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// A fully decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Push(PushEvent),
    Tickle(TickleEvent),
    Nop(NopEvent),
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Push(_) => EventKind::Push,
            StreamEvent::Tickle(_) => EventKind::Tickle,
            StreamEvent::Nop(_) => EventKind::Nop,
        }
    }
}

/// `{"type":"push","push":{...}}`: an ephemeral push such as a
/// mirrored phone notification.
///
/// A missing or `null` `push` object decodes to an empty [`PushMessage`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub push: PushMessage,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Body of a push event.
///
/// String fields missing from the wire decode to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushMessage {
    /// Push subtype, e.g. `"mirror"` or `"dismissal"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub package_name: String,
    /// Identifier correlating a mirror push with its later dismissal.
    #[serde(default)]
    pub notification_id: Option<String>,
    /// Device that originated the notification.
    #[serde(default)]
    pub source_device_iden: Option<String>,
}

impl PushMessage {
    pub fn is_dismissal(&self) -> bool {
        self.kind == PUSH_TYPE_DISMISSAL
    }
}

/// `{"type":"tickle","subtype":"push"}`: a hint that some server-side
/// collection changed and should be re-fetched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TickleEvent {
    #[serde(default)]
    pub subtype: String,
}

/// `{"type":"nop"}`: a heartbeat sent roughly every 30 seconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NopEvent {}
