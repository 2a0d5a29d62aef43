//! Connection manager for the Pushbullet realtime event stream.
//!
//! [`StreamClient`] owns at most one live WebSocket connection at a
//! time. [`open`](StreamClient::open) dials the stream and spawns the
//! receive loop, [`close`](StreamClient::close) cancels it, and
//! [`wait`](StreamClient::wait) blocks until it has exited.
//!
//! Connection failures are never retried here: a failed dial or a dead
//! socket leaves the client `Closed` until the caller opens it again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::handlers::HandlerRegistry;
use crate::processor::{process_frames, LoopExit};

/// Public Pushbullet realtime stream endpoint.
pub const PUSHBULLET_STREAM_ENDPOINT: &str = "wss://stream.pushbullet.com/websocket";

/// Where to connect and how to authenticate.
#[derive(Clone)]
pub struct StreamConfig {
    /// Base WebSocket URL; the access token is appended as a path segment.
    pub endpoint: String,
    /// Pushbullet access token.
    pub token: String,
}

impl StreamConfig {
    /// Config for the public Pushbullet endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: PUSHBULLET_STREAM_ENDPOINT.to_string(),
            token: token.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Full dial URL, `{endpoint}/{token}`.
    pub fn stream_url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.token)
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Lifecycle of a single connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

/// Errors returned by [`StreamClient::open`].
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// A connection is already opening or open; the call was ignored.
    #[error("Stream connection already open")]
    AlreadyOpen,

    /// The WebSocket dial failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// [`StreamClient::close`] was called while the dial was in flight.
    #[error("Connection attempt cancelled")]
    Cancelled,
}

/// Bookkeeping for the connection instance currently owned by the client.
struct ActiveConnection {
    id: u64,
    cancel: CancellationToken,
    /// `None` while the dial is still in flight.
    task: Option<JoinHandle<()>>,
}

/// Client for the realtime event stream.
///
/// Register handlers through [`registry`](Self::registry) before calling
/// [`open`](Self::open).
pub struct StreamClient {
    config: StreamConfig,
    dispatcher: Dispatcher,
    active: Mutex<Option<ActiveConnection>>,
    state_tx: watch::Sender<ConnectionState>,
    next_id: AtomicU64,
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> Self {
        Self::with_registry(config, Arc::new(HandlerRegistry::new()), DispatcherConfig::default())
    }

    /// Build a client around an existing registry.
    pub fn with_registry(
        config: StreamConfig,
        registry: Arc<HandlerRegistry>,
        dispatcher_config: DispatcherConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            config,
            dispatcher: Dispatcher::with_config(registry, dispatcher_config),
            active: Mutex::new(None),
            state_tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Open the stream and start the receive loop in the background.
    ///
    /// With `blocking` set, also waits until the receive loop exits.
    /// Fails without side effects if a connection is already opening or
    /// open. A failed dial is logged, leaves the client `Closed`, and is
    /// not retried.
    pub async fn open(&self, blocking: bool) -> Result<(), StreamClientError> {
        let claimed = self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                *state = ConnectionState::Opening;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::warn!("Stream connection already open, ignoring open request");
            return Err(StreamClientError::AlreadyOpen);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            // A previous instance that died on its own is finished by now.
            *active = Some(ActiveConnection {
                id,
                cancel: cancel.clone(),
                task: None,
            });
        }

        let url = self.config.stream_url();
        let dial = tokio::select! {
            _ = cancel.cancelled() => Err(StreamClientError::Cancelled),
            result = connect_async(&url) => result.map_err(|e| {
                StreamClientError::Connection(format!(
                    "Failed to connect to {}: {e}",
                    self.config.endpoint
                ))
            }),
        };

        let mut ws_stream = match dial {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open stream connection");
                self.clear_active(id).await;
                self.state_tx.send_replace(ConnectionState::Closed);
                return Err(e);
            }
        };

        tracing::info!(endpoint = %self.config.endpoint, "Connected to event stream");
        self.state_tx.send_replace(ConnectionState::Open);

        let dispatcher = self.dispatcher.clone();
        let state_tx = self.state_tx.clone();
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let exit = process_frames(&mut ws_stream, &dispatcher, &loop_cancel).await;
            if exit == LoopExit::Cancelled {
                if let Err(e) = ws_stream.close(None).await {
                    tracing::debug!(error = %e, "Failed to send close frame");
                }
            }
            tracing::info!(?exit, "Stream receive loop exited");
            state_tx.send_replace(ConnectionState::Closed);
        });

        {
            let mut active = self.active.lock().await;
            match active.as_mut() {
                Some(conn) if conn.id == id => conn.task = Some(task),
                // close() already took this instance; the loop sees the
                // cancelled token and exits on its own.
                _ => {}
            }
        }

        if blocking {
            self.wait().await;
        }
        Ok(())
    }

    /// Cancel the active connection and wait for its receive loop to exit.
    ///
    /// No-op when nothing is open. Frame and handler tasks already spawned
    /// keep running; use [`drain`](Self::drain) to wait for them.
    pub async fn close(&self) {
        let Some(conn) = self.active.lock().await.take() else {
            return;
        };

        tracing::info!("Closing stream connection");
        conn.cancel.cancel();
        if let Some(task) = conn.task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Stream receive task failed");
            }
        }
        self.wait().await;
    }

    /// Wait until the receive loop has exited, without cancelling it.
    ///
    /// Returns immediately when no connection is open.
    pub async fn wait(&self) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Wait for every frame and handler task spawned so far to finish.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// Number of frame and handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    async fn clear_active(&self, id: u64) {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|conn| conn.id == id) {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_appends_token() {
        let config = StreamConfig::new("o.abc123");
        assert_eq!(
            config.stream_url(),
            "wss://stream.pushbullet.com/websocket/o.abc123"
        );
    }

    #[test]
    fn stream_url_trims_trailing_slash() {
        let config = StreamConfig::new("tok").with_endpoint("ws://127.0.0.1:9000/");
        assert_eq!(config.stream_url(), "ws://127.0.0.1:9000/tok");
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", StreamConfig::new("secret-token"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn new_client_starts_closed() {
        let client = StreamClient::new(StreamConfig::new("tok"));
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_before_open_is_noop() {
        let client = StreamClient::new(StreamConfig::new("tok"));
        tokio::time::timeout(std::time::Duration::from_secs(1), client.close())
            .await
            .expect("close should return immediately");
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn wait_before_open_returns_immediately() {
        let client = StreamClient::new(StreamConfig::new("tok"));
        tokio::time::timeout(std::time::Duration::from_secs(1), client.wait())
            .await
            .expect("wait should return immediately");
    }

    #[test]
    fn error_display() {
        assert_eq!(
            StreamClientError::AlreadyOpen.to_string(),
            "Stream connection already open"
        );
        assert_eq!(
            StreamClientError::Connection("refused".into()).to_string(),
            "Connection error: refused"
        );
    }
}
