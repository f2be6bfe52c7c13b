//! Write side of a client connection
//!
//! Both the dispatcher (pushes) and the connection's own protocol handler
//! (replies) write through this trait, so implementations must serialize
//! concurrent sends themselves.

use crate::error::RelayError;
use async_trait::async_trait;

#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send one text frame.
    async fn send_text(&self, text: String) -> Result<(), RelayError>;

    /// Close the transport.
    async fn close(&self) -> Result<(), RelayError>;
}
