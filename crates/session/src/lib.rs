//! Transport session layer.
//!
//! Owns the duplex channel to the analytical dialogue service and drives
//! the connect choreography: open the channel, establish the inbound
//! subscriptions, send the start envelope, then relay user input and
//! fan inbound frames out to typed broadcast streams.

pub mod channel;
pub(crate) mod events;
pub mod session;
pub mod tcp;
pub mod testing;

pub use channel::{ChannelConnector, ChannelEvent, DuplexChannel};
pub use session::TransportSession;
pub use tcp::TcpConnector;
