//! Shared helpers for stream client integration tests.
//!
//! Each helper binds a WebSocket server on `127.0.0.1:0` and returns the
//! `ws://` endpoint to hand to `StreamConfig::with_endpoint`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

#[allow(dead_code)]
pub const PUSH_FRAME: &str = r#"{"type":"push","push":{"type":"test","application_name":"A","title":"Hi","body":"there","package_name":"pkg"}}"#;

/// What the server does after sending its scripted frames.
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum AfterFrames {
    /// Send a Close frame.
    Close,
    /// Keep the socket open until the client goes away.
    Hold,
}

/// A scripted server accepting any number of connections.
pub struct TestServer {
    pub endpoint: String,
    pub connections: Arc<AtomicUsize>,
    #[allow(dead_code)]
    pub handle: JoinHandle<()>,
}

impl TestServer {
    #[allow(dead_code)]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Accept WebSocket clients, send `frames` to each, then follow `after`.
pub async fn spawn_ws_server(frames: Vec<Message>, after: AfterFrames) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    let handle = tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let frames = frames.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                for frame in frames {
                    if ws.send(frame).await.is_err() {
                        return;
                    }
                }
                match after {
                    AfterFrames::Close => {
                        let _ = ws.close(None).await;
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                    AfterFrames::Hold => while let Some(Ok(_)) = ws.next().await {},
                }
            });
        }
    });

    TestServer {
        endpoint: format!("ws://{addr}"),
        connections,
        handle,
    }
}

/// A TCP server that accepts connections and drops them before the
/// WebSocket handshake, so every dial fails.
#[allow(dead_code)]
pub async fn spawn_rejecting_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    let handle = tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(tcp);
        }
    });

    TestServer {
        endpoint: format!("ws://{addr}"),
        connections,
        handle,
    }
}
