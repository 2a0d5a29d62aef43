//! Fan-out of decoded events to registered handlers.
//!
//! Every text frame read from the socket becomes its own task that
//! decodes the frame and dispatches the result; every matching handler
//! invocation then becomes a further task. Neither tier blocks the
//! receive loop, and one slow handler never delays its siblings or the
//! next frame.
//!
//! All tasks are spawned on a shared [`TaskTracker`], so
//! [`Dispatcher::drain`] can wait for outstanding work during shutdown.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::decoder::decode_frame;
use crate::handlers::HandlerRegistry;
use crate::messages::StreamEvent;

/// Tunables for the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Upper bound on handler invocations executing at once.
    ///
    /// `None` leaves concurrency unbounded. Values are clamped to
    /// `1..=Semaphore::MAX_PERMITS`. Invocations over the limit are
    /// still spawned immediately and wait for a permit, so the receive
    /// loop is never slowed down by handlers.
    pub max_in_flight: Option<usize>,
}

/// Decodes frames and fans events out to handlers on background tasks.
///
/// Cheap to clone; clones share the registry, tracker and limiter.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    tracker: TaskTracker,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    pub fn with_config(registry: Arc<HandlerRegistry>, config: DispatcherConfig) -> Self {
        let limiter = config
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS))));
        Self {
            registry,
            tracker: TaskTracker::new(),
            limiter,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Schedule decoding and dispatch of one text frame and return at once.
    pub fn handle_frame(&self, text: String) {
        let this = self.clone();
        self.tracker.spawn(async move {
            this.process_frame(&text).await;
        });
    }

    /// Decode `text` and dispatch the result. Bad frames are logged and dropped.
    async fn process_frame(&self, text: &str) {
        match decode_frame(text) {
            Ok(Some(event)) => {
                self.dispatch(event).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, len = text.len(), "Dropping undecodable stream frame");
                tracing::trace!(raw_frame = %text, "Undecodable frame contents");
            }
        }
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Each invocation runs on its own task; completion order is not
    /// defined and nothing flows back from the handlers. Returns how many
    /// invocations were scheduled.
    pub async fn dispatch(&self, event: StreamEvent) -> usize {
        let kind = event.kind();
        let handlers = self.registry.snapshot(kind).await;
        if handlers.is_empty() {
            tracing::trace!(kind = %kind, "No handlers registered");
            return 0;
        }

        let mut scheduled = 0;
        for handler in handlers {
            let Some(invocation) = handler.invoke(&event) else {
                tracing::debug!(kind = %kind, handler = ?handler, "Skipping handler for mismatched event");
                continue;
            };

            let limiter = self.limiter.clone();
            self.tracker.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return,
                    },
                    None => None,
                };
                invocation.await;
            });
            scheduled += 1;
        }

        tracing::debug!(kind = %kind, handlers = scheduled, "Dispatched stream event");
        scheduled
    }

    /// Number of frame and handler tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every frame and handler task spawned so far has finished.
    ///
    /// Tasks spawned while draining are waited for as well. The
    /// dispatcher remains usable afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
