//! Request decoding and response serialization.
//!
//! The codec is deliberately lenient about command-specific fields: only the
//! 3-byte minimal header and a known command number are required.  Accessors
//! on [`Request`] return `None` or an empty payload when a packet is too short
//! for the field they read, so the host bus loop decides what a short packet
//! means.

use thiserror::Error;

use crate::protocol::messages::{
    Request, Response, SmartPortCommand, MIN_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};

/// Errors that can occur while decoding a packet or a SLIP frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimal request header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Byte 1 of the request is not a SmartPort command number.
    #[error("unknown SmartPort command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// A SLIP escape byte was followed by something other than ESC_END/ESC_ESC.
    #[error("invalid SLIP escape sequence: 0xDB 0x{0:02X}")]
    InvalidEscape(u8),

    /// A SLIP frame grew past the configured limit before its END byte.
    #[error("SLIP frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },
}

/// Decodes one request packet.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] for packets shorter than the
/// minimal header and [`ProtocolError::UnknownCommand`] for unrecognised
/// command numbers.
///
/// # Examples
///
/// ```rust
/// use smartport_core::protocol::{decode_request, SmartPortCommand};
///
/// let req = decode_request(&[0x01, 0x01, 0x01, 0x02, 0x00, 0x00]).unwrap();
/// assert_eq!(req.command(), SmartPortCommand::ReadBlock);
/// assert_eq!(req.block_number(), Some(2));
/// ```
pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    if bytes.len() < MIN_HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: MIN_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let command =
        SmartPortCommand::try_from(bytes[1]).map_err(ProtocolError::UnknownCommand)?;

    Ok(Request {
        sequence: bytes[0],
        command,
        unit: bytes[2],
        raw: bytes.to_vec(),
    })
}

/// Serializes a response into its wire form (without SLIP framing).
pub fn serialize_response(response: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RESPONSE_HEADER_SIZE + response.payload.len());
    buf.push(response.sequence);
    buf.push(response.command as u8);
    buf.push(response.source);
    buf.push(response.status);
    buf.extend_from_slice(&response.payload);
    buf
}
