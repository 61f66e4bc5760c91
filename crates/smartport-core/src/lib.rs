//! # smartport-core
//!
//! Shared library for the SmartPort bridge containing the request/response
//! codec, SLIP framing, and the bus-side domain types.
//!
//! It has no dependencies on sockets or async runtimes, so everything here
//! can be tested with plain byte slices.
//!
//! # Architecture overview (for beginners)
//!
//! An Apple II talks to its disk drives over the SmartPort bus.  The bridge
//! pretends to be a SmartPort device, but instead of reading a local disk
//! image it forwards every bus command to a server over TCP.
//!
//! - **`protocol`** – How bytes travel over the network.  Packets are
//!   wrapped in SLIP frames on the stream; inside a frame, a request starts
//!   with a 3-byte header (sequence, command, unit) and a response with a
//!   4-byte header (sequence, command, source, status).
//!
//! - **`domain`** – What the host bus loop sees: the phase-line pattern
//!   returned on each poll, the command mode, and the table of reserved
//!   control sequences such as remote reboot.

pub mod domain;
pub mod protocol;

pub use domain::{CommandMode, Phase, SpecialCommand, SpecialCommandTable};
pub use protocol::codec::{decode_request, serialize_response, ProtocolError};
pub use protocol::messages::{PacketType, Request, Response, SmartPortCommand};
