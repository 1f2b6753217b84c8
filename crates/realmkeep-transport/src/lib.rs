//! Transport layer for Realmkeep.
//!
//! Provides the [`Transport`] and [`Connection`] traits the network
//! bridge is written against, a WebSocket implementation, and the
//! per-connection [`OpcodeHistory`] ring.
//!
//! This layer moves opaque frames. It knows nothing about opcodes beyond
//! recording their raw values for diagnostics.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod history;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use history::{DEFAULT_HISTORY_CAPACITY, OpcodeHistory};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// The address the listener is bound to.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single connection that moves whole frames in both directions.
///
/// `send` and `recv` may run concurrently from different tasks: the
/// bridge has one reader task and one writer task per connection.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the peer.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Starts a graceful close.
    async fn close(&self) -> Result<(), TransportError>;

    fn id(&self) -> ConnectionId;

    /// The remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}
