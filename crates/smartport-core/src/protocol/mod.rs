//! Protocol module: SmartPort packet types, the request/response codec, and
//! SLIP framing.

pub mod codec;
pub mod hexdump;
pub mod messages;
pub mod slip;

pub use codec::{decode_request, serialize_response, ProtocolError};
pub use hexdump::hexdump;
pub use messages::*;
pub use slip::{encode_frame, SlipDecoder};
