//! Transport ports the bridge depends on.
//!
//! The application layer only knows that it can open a [`Link`] to an
//! address and then read and write whole frames on it.  How frames are
//! delimited on the wire (SLIP over TCP in production, in-memory channels in
//! tests) is an infrastructure concern.
//!
//! A link is split into a reader and a writer so the receiver unit can block
//! in [`FrameReader::read_frame`] while the polling unit writes responses.

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while locating or connecting to the server.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Name resolution failed.  Fatal at startup; never retried.
    #[error("could not resolve server host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Name resolution succeeded but returned no addresses.
    #[error("server host '{host}' resolved to no addresses")]
    NoAddress { host: String },

    /// A single connect attempt failed.  Retried indefinitely.
    #[error("failed to connect to server at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Errors on an established link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// There is no live link to write to (not yet connected, or reconnecting).
    #[error("not connected to server")]
    NotConnected,

    /// The server closed the link and a replacement is not up yet.
    #[error("connection closed by server; reconnecting")]
    Closed,
}

/// Read side of a link.
#[async_trait]
pub trait FrameReader: Send {
    /// Waits for the next complete frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Write side of a link.
#[async_trait]
pub trait FrameWriter: Send {
    /// Writes one complete frame.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

/// An open connection, split into independently owned halves.
pub struct Link {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

/// Opens links to the server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Makes one connection attempt.  Retrying is the caller's job.
    async fn connect(&self, addr: SocketAddr) -> Result<Link, ConnectError>;
}
