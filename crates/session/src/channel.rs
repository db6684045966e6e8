//! Duplex channel seam.
//!
//! The session never touches sockets directly; it talks to a
//! [`DuplexChannel`] obtained from a [`ChannelConnector`] and consumes the
//! channel's event stream. Production uses the TCP implementation in
//! [`crate::tcp`]; tests use [`crate::testing::MockConnector`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use vui_core::{Envelope, InboundFrame, Result};

/// Events emitted by a channel after it has been opened.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel completed its handshake and accepts envelopes.
    Ready,
    /// An inbound frame arrived.
    Frame(InboundFrame),
    /// A channel-level failure. The channel may or may not still be
    /// usable; tearing it down is the session owner's call.
    Fault(String),
    /// The peer closed the channel.
    Closed,
}

/// An open duplex channel.
///
/// `send` queues the envelope without blocking; delivery failures surface
/// as [`ChannelEvent::Fault`] on the event stream.
pub trait DuplexChannel: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<()>;
    fn close(&self);
}

/// Factory for duplex channels.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn open(
        &self,
        endpoint: &str,
    ) -> Result<(Box<dyn DuplexChannel>, mpsc::UnboundedReceiver<ChannelEvent>)>;
}
