//! Per-connection protocol handler
//!
//! Lifecycle: `Connected` (registered with an empty subscription) → command
//! loop → `Closed` (unregistered). The handler is transport-agnostic: it
//! consumes a stream of `Inbound` frames and writes through an `Outbound`.

use crate::error::CommandError;
use crate::outbound::Outbound;
use crate::protocol::{parse_command, Command, PricePoint, ServerMessage};
use crate::registry::ConnectionId;
use crate::state::AppState;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use types::ids::InstrumentId;

/// Inbound frame, reduced to what the protocol cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close,
    /// Transport-level failure
    Error(String),
    /// Binary, ping and pong frames
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Closed,
}

pub struct ProtocolHandler {
    state: AppState,
    connection: ConnectionId,
    outbound: Arc<dyn Outbound>,
    session: SessionState,
}

impl ProtocolHandler {
    /// Register the connection with no subscription.
    pub fn connect(state: AppState, outbound: Arc<dyn Outbound>) -> Self {
        let connection = state.registry.register(Arc::clone(&outbound));
        info!(connection = %connection, "New client connected");
        Self {
            state,
            connection,
            outbound,
            session: SessionState::Connected,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    /// Process frames until the client closes, the transport fails, or the
    /// stream ends. Always unregisters on the way out.
    pub async fn run<S>(mut self, mut frames: S)
    where
        S: Stream<Item = Inbound> + Unpin,
    {
        // Registered after close_all drained the registry: nobody else will close it
        if self.state.closing.is_cancelled() {
            info!(connection = %self.connection, "Connection arrived during shutdown");
            if let Err(e) = self.outbound.close().await {
                debug!(connection = %self.connection, error = %e, "Close during shutdown failed");
            }
            self.session = SessionState::Closed;
            self.state.registry.unregister(self.connection);
            return;
        }

        while let Some(frame) = frames.next().await {
            match frame {
                Inbound::Text(text) => self.handle_text(&text).await,
                Inbound::Close => {
                    if let Err(e) = self.outbound.close().await {
                        debug!(connection = %self.connection, error = %e, "Close after client close failed");
                    }
                    break;
                }
                Inbound::Error(e) => {
                    info!(connection = %self.connection, error = %e, "WebSocket connection closed with exception");
                    break;
                }
                Inbound::Ignored => {
                    debug!(connection = %self.connection, "Ignoring non-text frame");
                }
            }
        }

        self.session = SessionState::Closed;
        self.state.registry.unregister(self.connection);
        info!(connection = %self.connection, "WebSocket connection closed");
    }

    /// Interpret one text frame and send the reply, if any.
    pub async fn handle_text(&self, text: &str) {
        debug!(connection = %self.connection, message = %text, "Received message");

        match parse_command(text, &self.state.catalog) {
            Ok(Command::Assets) => {
                self.send_message(&ServerMessage::assets(&self.state.catalog))
                    .await;
            }
            Ok(Command::Subscribe(instrument)) => self.subscribe(instrument).await,
            Err(e) => {
                if e == CommandError::InvalidJson {
                    warn!(connection = %self.connection, message = %text, "Invalid JSON in message");
                }
                self.send_error(e).await;
            }
        }
    }

    /// Replace the subscription, then reply with the recent history.
    async fn subscribe(&self, instrument: InstrumentId) {
        if !self.state.registry.set_subscription(self.connection, instrument) {
            warn!(connection = %self.connection, "Subscribe on unregistered connection");
            return;
        }
        info!(connection = %self.connection, instrument = %instrument, "Subscribed");

        let samples = match self
            .state
            .store
            .recent_samples(instrument, self.state.settings.history_window)
            .await
        {
            Ok(samples) => samples,
            Err(e) => {
                error!(connection = %self.connection, instrument = %instrument, error = %e, "History query failed");
                return;
            }
        };

        let name = self
            .state
            .catalog
            .symbol_of(instrument)
            .map(|s| s.as_str())
            .unwrap_or_default();
        let points = samples
            .iter()
            .map(|sample| PricePoint::from_sample(name, sample, self.state.settings.decimals))
            .collect();
        self.send_message(&ServerMessage::AssetHistory { points })
            .await;
    }

    async fn send_message(&self, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(text) => self.send(text).await,
            Err(e) => error!(connection = %self.connection, error = %e, "Failed to encode reply"),
        }
    }

    /// Errors go out as bare text, not JSON.
    async fn send_error(&self, error: CommandError) {
        self.send(error.to_string()).await;
    }

    async fn send(&self, text: String) {
        if let Err(e) = self.outbound.send_text(text).await {
            warn!(connection = %self.connection, error = %e, "Reply delivery failed");
        }
    }
}
