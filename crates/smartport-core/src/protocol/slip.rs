//! SLIP framing (RFC 1055) for packets carried over a byte stream.
//!
//! Each packet is sent as `END payload END`.  Inside the payload, `END` is
//! replaced by `ESC ESC_END` and `ESC` by `ESC ESC_ESC`, so an `END` byte on
//! the wire always marks a frame boundary.
//!
//! # Why a streaming decoder?
//!
//! TCP delivers a stream, not messages: one `read()` may return half a frame
//! or several frames at once.  [`SlipDecoder`] keeps the partial frame between
//! calls and yields complete frames as their closing `END` arrives.

use crate::protocol::codec::ProtocolError;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

/// Largest frame the decoder accepts unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

/// Encodes `payload` as one SLIP frame, including leading and trailing `END`.
///
/// The leading `END` flushes any line noise the receiver may have buffered.
///
/// # Examples
///
/// ```rust
/// use smartport_core::protocol::slip::{encode_frame, END, ESC, ESC_END};
///
/// let frame = encode_frame(&[0x01, END]);
/// assert_eq!(frame, vec![END, 0x01, ESC, ESC_END, END]);
/// ```
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(END);
    for &byte in payload {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            other => out.push(other),
        }
    }
    out.push(END);
    out
}

/// Incremental SLIP decoder.
#[derive(Debug)]
pub struct SlipDecoder {
    frame: Vec<u8>,
    escaped: bool,
    // Set after an error until the next END; bytes in between are dropped.
    discarding: bool,
    max_frame_len: usize,
}

impl SlipDecoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            frame: Vec::new(),
            escaped: false,
            discarding: false,
            max_frame_len,
        }
    }

    /// Consumes one byte from the stream.
    ///
    /// Returns `Ok(Some(frame))` when `byte` closes a non-empty frame and
    /// `Ok(None)` otherwise.  Empty frames (back-to-back `END`s) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidEscape`] or
    /// [`ProtocolError::FrameTooLarge`] once per corrupt frame; the rest of
    /// that frame is discarded up to the next `END`.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Vec<u8>>, ProtocolError> {
        if byte == END {
            let was_discarding = self.discarding;
            self.escaped = false;
            self.discarding = false;
            if was_discarding || self.frame.is_empty() {
                self.frame.clear();
                return Ok(None);
            }
            return Ok(Some(std::mem::take(&mut self.frame)));
        }

        if self.discarding {
            return Ok(None);
        }

        let decoded = if self.escaped {
            self.escaped = false;
            match byte {
                ESC_END => END,
                ESC_ESC => ESC,
                other => return Err(self.abandon(ProtocolError::InvalidEscape(other))),
            }
        } else if byte == ESC {
            self.escaped = true;
            return Ok(None);
        } else {
            byte
        };

        if self.frame.len() >= self.max_frame_len {
            return Err(self.abandon(ProtocolError::FrameTooLarge {
                max: self.max_frame_len,
            }));
        }
        self.frame.push(decoded);
        Ok(None)
    }

    /// Feeds a chunk of stream bytes, returning completed frames and framing
    /// errors in stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Vec<u8>, ProtocolError>> {
        bytes
            .iter()
            .filter_map(|&b| self.push_byte(b).transpose())
            .collect()
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.frame.len()
    }

    fn abandon(&mut self, err: ProtocolError) -> ProtocolError {
        self.frame.clear();
        self.escaped = false;
        self.discarding = true;
        err
    }
}

impl Default for SlipDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}
