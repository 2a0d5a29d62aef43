//! Typed event handlers and the kind-indexed registry that stores them.
//!
//! A [`Handler`] wraps an async callback for exactly one event variant.
//! [`HandlerRegistry`] keeps handlers grouped by [`EventKind`] in
//! registration order. It is written rarely (usually once at startup)
//! and read on every dispatch, so it sits behind an `RwLock` and readers
//! only hold the lock long enough to clone the handler list.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;

use crate::messages::{EventKind, NopEvent, PushEvent, StreamEvent, TickleEvent, UnknownKind};

/// Type-erased async callback receiving an owned event payload.
pub type Callback<E> = Arc<dyn Fn(E) -> BoxFuture<'static, ()> + Send + Sync>;

/// A callback bound to exactly one event variant.
#[derive(Clone)]
pub enum Handler {
    Push(Callback<PushEvent>),
    Tickle(Callback<TickleEvent>),
    Nop(Callback<NopEvent>),
}

impl Handler {
    /// Build a handler for push events.
    pub fn push<F, Fut>(f: F) -> Self
    where
        F: Fn(PushEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler::Push(Arc::new(move |event| f(event).boxed()))
    }

    /// Build a handler for tickle events.
    pub fn tickle<F, Fut>(f: F) -> Self
    where
        F: Fn(TickleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler::Tickle(Arc::new(move |event| f(event).boxed()))
    }

    /// Build a handler for heartbeat events.
    pub fn nop<F, Fut>(f: F) -> Self
    where
        F: Fn(NopEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler::Nop(Arc::new(move |event| f(event).boxed()))
    }

    /// The event kind this handler accepts.
    pub fn kind(&self) -> EventKind {
        match self {
            Handler::Push(_) => EventKind::Push,
            Handler::Tickle(_) => EventKind::Tickle,
            Handler::Nop(_) => EventKind::Nop,
        }
    }

    /// Produce the callback future for `event`.
    ///
    /// Returns `None` when `event` is not the variant this handler was
    /// built for; the caller skips the invocation.
    pub fn invoke(&self, event: &StreamEvent) -> Option<BoxFuture<'static, ()>> {
        match (self, event) {
            (Handler::Push(cb), StreamEvent::Push(e)) => Some(cb(e.clone())),
            (Handler::Tickle(cb), StreamEvent::Tickle(e)) => Some(cb(e.clone())),
            (Handler::Nop(cb), StreamEvent::Nop(e)) => Some(cb(e.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// Errors returned when a handler cannot be registered.
///
/// Registration failures are logged and leave the registry unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The requested kind name is not one this client can decode.
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),

    /// The handler was built for a different kind than the one requested.
    #[error("Handler for {actual} events cannot be registered as {requested}")]
    KindMismatch {
        requested: EventKind,
        actual: EventKind,
    },
}

/// Concurrency-safe mapping from event kind to registered handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<Handler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` under the kind it declares.
    pub async fn register(&self, handler: Handler) {
        let kind = handler.kind();
        let mut handlers = self.handlers.write().await;
        let list = handlers.entry(kind).or_default();
        list.push(Arc::new(handler));
        tracing::debug!(kind = %kind, count = list.len(), "Registered stream handler");
    }

    /// Register `handler` under a kind named at runtime.
    ///
    /// Rejects names that match no known kind and names that differ from
    /// the handler's own kind, so a handler is never stored under a kind
    /// it cannot accept.
    pub async fn register_as(&self, kind_name: &str, handler: Handler) -> Result<(), RegistryError> {
        let requested = match kind_name.parse::<EventKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(kind = kind_name, "Rejected handler for unknown event kind");
                return Err(e.into());
            }
        };

        let actual = handler.kind();
        if requested != actual {
            tracing::warn!(
                requested = %requested,
                actual = %actual,
                "Rejected handler registered under the wrong kind",
            );
            return Err(RegistryError::KindMismatch { requested, actual });
        }

        self.register(handler).await;
        Ok(())
    }

    /// Clone the current handler list for `kind`, in registration order.
    pub async fn snapshot(&self, kind: EventKind) -> Vec<Arc<Handler>> {
        self.handlers
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of handlers currently registered for `kind`.
    pub async fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().await.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;

    use super::*;
    use crate::messages::PushMessage;

    fn push_event(title: &str) -> StreamEvent {
        StreamEvent::Push(PushEvent {
            push: PushMessage {
                kind: "mirror".into(),
                title: title.into(),
                ..Default::default()
            },
        })
    }

    #[test]
    fn handler_reports_declared_kind() {
        assert_eq!(Handler::push(|_| async {}).kind(), EventKind::Push);
        assert_eq!(Handler::tickle(|_| async {}).kind(), EventKind::Tickle);
        assert_eq!(Handler::nop(|_| async {}).kind(), EventKind::Nop);
    }

    #[tokio::test]
    async fn invoke_runs_callback_for_matching_variant() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let handler = Handler::push(move |event| {
            let seen = Arc::clone(&seen_clone);
            async move {
                assert_eq!(event.push.title, "Hi");
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        handler.invoke(&push_event("Hi")).unwrap().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoke_skips_mismatched_variant() {
        let handler = Handler::tickle(|_| async { panic!("must not run") });
        assert!(handler.invoke(&push_event("Hi")).is_none());
        assert!(handler.invoke(&StreamEvent::Nop(NopEvent {})).is_none());
    }

    #[tokio::test]
    async fn register_groups_by_kind_in_order() {
        let registry = HandlerRegistry::new();
        registry.register(Handler::push(|_| async {})).await;
        registry.register(Handler::tickle(|_| async {})).await;
        registry.register(Handler::push(|_| async {})).await;

        assert_eq!(registry.handler_count(EventKind::Push).await, 2);
        assert_eq!(registry.handler_count(EventKind::Tickle).await, 1);
        assert_eq!(registry.handler_count(EventKind::Nop).await, 0);

        let snapshot = registry.snapshot(EventKind::Push).await;
        assert!(snapshot.iter().all(|h| h.kind() == EventKind::Push));
    }

    #[tokio::test]
    async fn register_as_accepts_matching_kind() {
        let registry = HandlerRegistry::new();
        registry
            .register_as("nop", Handler::nop(|_| async {}))
            .await
            .unwrap();
        assert_eq!(registry.handler_count(EventKind::Nop).await, 1);
    }

    #[tokio::test]
    async fn register_as_rejects_unknown_kind() {
        let registry = HandlerRegistry::new();
        let err = registry
            .register_as("sms_changed", Handler::push(|_| async {}))
            .await
            .unwrap_err();

        assert_matches!(err, RegistryError::UnknownKind(_));
        for kind in EventKind::ALL {
            assert_eq!(registry.handler_count(kind).await, 0);
        }
    }

    #[tokio::test]
    async fn register_as_rejects_mismatched_kind() {
        let registry = HandlerRegistry::new();
        let err = registry
            .register_as("tickle", Handler::push(|_| async {}))
            .await
            .unwrap_err();

        assert_matches!(
            err,
            RegistryError::KindMismatch {
                requested: EventKind::Tickle,
                actual: EventKind::Push,
            }
        );
        assert_eq!(registry.handler_count(EventKind::Tickle).await, 0);
        assert_eq!(registry.handler_count(EventKind::Push).await, 0);
    }

    #[tokio::test]
    async fn snapshot_is_unaffected_by_later_registration() {
        let registry = HandlerRegistry::new();
        registry.register(Handler::push(|_| async {})).await;

        let snapshot = registry.snapshot(EventKind::Push).await;
        registry.register(Handler::push(|_| async {})).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.handler_count(EventKind::Push).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_snapshots_see_registration_order_prefixes() {
        const HANDLERS: usize = 200;
        const READERS: usize = 4;

        let registry = Arc::new(HandlerRegistry::new());
        let done = tokio_util::sync::CancellationToken::new();

        let mut readers = Vec::new();
        for _ in 0..READERS {
            let registry = Arc::clone(&registry);
            let done = done.clone();
            readers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while !done.is_cancelled() {
                    seen.push(registry.snapshot(EventKind::Push).await);
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..HANDLERS {
                    registry.register(Handler::push(|_| async {})).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        writer.await.unwrap();
        done.cancel();

        let last = registry.snapshot(EventKind::Push).await;
        assert_eq!(last.len(), HANDLERS);

        for reader in readers {
            let seen = reader.await.unwrap();
            let mut previous = 0;
            for snapshot in seen {
                assert!(snapshot.len() >= previous, "snapshots never shrink");
                previous = snapshot.len();
                for (taken, registered) in snapshot.iter().zip(&last) {
                    assert!(Arc::ptr_eq(taken, registered), "snapshot out of registration order");
                }
            }
        }
        assert_eq!(registry.handler_count(EventKind::Tickle).await, 0);
    }
}
