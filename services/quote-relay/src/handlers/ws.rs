use crate::error::RelayError;
use crate::outbound::Outbound;
use crate::session::{Inbound, ProtocolHandler};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::sink::{Sink, SinkExt};
use futures::stream::StreamExt;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bound on the closing handshake with a peer that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.closing.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let outbound = Arc::new(WsOutbound::spawn(sink, state.outbound.queue_capacity));
    let dropped = outbound.dropped();
    let handler = ProtocolHandler::connect(state, outbound);

    // A lagging client is dropped by its writer; stop reading it too
    let frames = stream
        .map(|msg| match msg {
            Ok(Message::Text(text)) => Inbound::Text(text.as_str().to_owned()),
            Ok(Message::Close(_)) => Inbound::Close,
            Ok(_) => Inbound::Ignored,
            Err(e) => Inbound::Error(e.to_string()),
        })
        .take_until(dropped.clone().cancelled_owned());
    handler.run(Box::pin(frames)).await;
    dropped.cancel();
}

/// Write half of a client connection.
///
/// Frames go into a bounded queue drained by a dedicated writer task, so a
/// send never waits on the peer. When the queue is full the client is
/// treated as lagging and disconnected.
pub struct WsOutbound {
    queue: mpsc::Sender<String>,
    dropped: CancellationToken,
}

impl WsOutbound {
    pub fn spawn<S>(sink: S, capacity: usize) -> Self
    where
        S: Sink<Message> + Send + Unpin + 'static,
        S::Error: Display,
    {
        let (queue, frames) = mpsc::channel(capacity.max(1));
        let dropped = CancellationToken::new();
        tokio::spawn(write_frames(sink, frames, dropped.clone()));
        Self { queue, dropped }
    }

    /// Fires once the connection is closed or dropped.
    pub fn dropped(&self) -> CancellationToken {
        self.dropped.clone()
    }
}

async fn write_frames<S>(mut sink: S, mut frames: mpsc::Receiver<String>, dropped: CancellationToken)
where
    S: Sink<Message> + Send + Unpin + 'static,
    S::Error: Display,
{
    loop {
        let text = tokio::select! {
            biased;
            _ = dropped.cancelled() => break,
            next = frames.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };
        tokio::select! {
            biased;
            _ = dropped.cancelled() => break,
            result = sink.send(Message::Text(text.into())) => {
                if let Err(e) = result {
                    debug!(error = %e, "WebSocket write failed");
                    dropped.cancel();
                    break;
                }
            }
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "WebSocket close failed"),
        Err(_) => debug!("WebSocket close timed out"),
    }
}

#[async_trait]
impl Outbound for WsOutbound {
    async fn send_text(&self, text: String) -> Result<(), RelayError> {
        if self.dropped.is_cancelled() {
            return Err(RelayError::Delivery("connection closed".to_string()));
        }
        match self.queue.try_send(text) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Send queue full, disconnecting lagging client");
                self.dropped.cancel();
                Err(RelayError::Delivery("send queue full".to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                Err(RelayError::Delivery("connection closed".to_string()))
            }
        }
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.dropped.cancel();
        Ok(())
    }
}
