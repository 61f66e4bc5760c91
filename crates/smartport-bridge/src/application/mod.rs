//! Application layer of the bridge.
//!
//! # What does each module do?
//!
//! - **`transport`** – The ports the bridge needs from the network:
//!   `Connector`, `FrameReader`, `FrameWriter`.  No sockets here.
//!
//! - **`request_queue`** – The FIFO of raw frames between the receiver and
//!   the polling side.
//!
//! - **`connection`** – The background supervisor that connects, retries,
//!   receives frames and reconnects when the server hangs up.
//!
//! - **`bus_bridge`** – The synchronous API the host bus loop calls:
//!   poll for a phase, read the staged command, answer it.

pub mod bus_bridge;
pub mod connection;
pub mod request_queue;
pub mod transport;
