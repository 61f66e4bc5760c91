//! smartport-bridge library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the bridge do? (for beginners)
//!
//! The bridge sits on an Apple II SmartPort bus and answers as if it were a
//! disk drive, but the "drive" is really a server on the network.  The host
//! bus loop polls the bridge constantly:
//!
//! 1. A background task keeps a TCP connection to the server and queues every
//!    SLIP frame the server sends.
//! 2. Each poll pops one queued frame.  A normal SmartPort request is staged
//!    and the poll reports the *enabled* phase so the host reads the command.
//! 3. The host answers through `encode_response` and `send_response_packet`,
//!    which ship the response back over the same connection.
//! 4. A reserved 4-byte frame from the server makes the bridge drop and
//!    re-establish the connection, and the poll reports the *reset* phase.

/// Application layer: ports, connection supervisor and the bus-facing bridge.
pub mod application;

/// Infrastructure layer: TCP/SLIP transport, test doubles and config storage.
pub mod infrastructure;

pub use application::bus_bridge::{Bridge, BridgeError, BridgeSettings, ShutdownHandle};
pub use application::connection::{LinkState, RetryPolicy};
