//! Socket layer for Plaza.
//!
//! Every player in a town holds one long-lived socket, opened right after
//! the join call and kept until the player leaves. Frames on it are opaque
//! here; `plaza-protocol` gives them meaning.
//!
//! The socket side is split in two traits so the server loop never names
//! a concrete socket type:
//!
//! - [`Transport`] hands out freshly accepted sockets.
//! - [`Connection`] is one player's socket, full duplex.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] on `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Names one socket for as long as the process runs.
///
/// A session records the id of the socket it is bound to; a second socket
/// presenting the same session token is told apart by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id. Transports use [`next`](Self::next) instead.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// A process-unique id for a newly accepted socket.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of player sockets.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next socket and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One player's socket.
///
/// The server waits on [`recv`](Self::recv) for movements while it pushes
/// town events through [`send`](Self::send), both from one
/// `tokio::select!`. A pending receive must never block a send.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one whole frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next whole frame. `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Asks the peer for a sign of life. The answer is never returned by
    /// [`recv`](Self::recv); it only moves [`last_seen`](Self::last_seen).
    async fn ping(&self) -> Result<(), Self::Error>;

    /// When the peer last sent anything at all, control frames included.
    /// Starts at the moment the socket was accepted.
    fn last_seen(&self) -> Instant;

    /// Starts a clean close. Frames already sent are delivered first.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
