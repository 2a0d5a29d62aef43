//! Receive loop for an open stream connection.
//!
//! The loop is the only reader of the socket. It reads frames strictly
//! in arrival order and hands each text frame to the [`Dispatcher`]
//! without waiting for decoding or handlers, then goes back to reading.

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;

/// Why the receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The connection's cancellation token fired.
    Cancelled,
    /// The server sent a Close frame.
    ClosedByServer,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// Reading from the socket failed.
    ReadError(String),
}

/// Read frames until cancellation, close, end of stream or a read error.
///
/// Every outcome is terminal for the connection; the caller decides what
/// happens next. Cancellation is checked before each read so a cancelled
/// loop never picks up another frame.
pub async fn process_frames<S>(
    ws_stream: &mut S,
    dispatcher: &Dispatcher,
    cancel: &CancellationToken,
) -> LoopExit
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            next = ws_stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                tracing::trace!(len = text.len(), "Received stream frame");
                dispatcher.handle_frame(text);
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::trace!(len = data.len(), "Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                // Pongs are queued by tungstenite itself.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Stream closed by server");
                return LoopExit::ClosedByServer;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Stream receive error");
                return LoopExit::ReadError(e.to_string());
            }
            None => {
                tracing::info!("Stream exhausted");
                return LoopExit::StreamEnded;
            }
        }
    }
}
