//! Pushbullet realtime event stream client.
//!
//! Provides typed event definitions, a two-phase frame decoder, a
//! kind-indexed handler registry, a fan-out dispatcher, and the
//! WebSocket connection manager that ties them together.

pub mod client;
pub mod decoder;
pub mod dispatcher;
pub mod handlers;
pub mod messages;
pub mod processor;

pub use client::{ConnectionState, StreamClient, StreamClientError, StreamConfig};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use handlers::{Handler, HandlerRegistry, RegistryError};
pub use messages::{EventKind, NopEvent, PushEvent, PushMessage, StreamEvent, TickleEvent};
