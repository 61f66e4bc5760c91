//! SmartPort packet types exchanged with the remote server.
//!
//! Request packet layout (multi-byte integers are little-endian):
//! ```text
//! [seq:1][command:1][unit:1][params:0..5][payload:N]
//! ```
//!
//! Response packet layout:
//! ```text
//! [seq:1][command:1][source:1][status:1][payload:N]
//! ```
//!
//! # What is SmartPort? (for beginners)
//!
//! SmartPort is the daisy-chained block-device bus of the Apple II family.
//! The host computer drives four "phase" lines to signal the bus state and
//! then exchanges short command packets with a device.  A command packet is
//! always 8 bytes long once the header has been unpacked, which is why the
//! bridge stages exactly 8 bytes for the host to read.

/// Minimum number of bytes a request must carry: sequence, command, unit.
pub const MIN_HEADER_SIZE: usize = 3;

/// Size of the command packet staged for the host bus loop.
pub const COMMAND_PACKET_SIZE: usize = 8;

/// Size of the fixed response header: sequence, command, source, status.
pub const RESPONSE_HEADER_SIZE: usize = 4;

/// SmartPort command numbers as they appear in byte 1 of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SmartPortCommand {
    Status = 0x00,
    ReadBlock = 0x01,
    WriteBlock = 0x02,
    Format = 0x03,
    Control = 0x04,
    Init = 0x05,
    Open = 0x06,
    Close = 0x07,
    Read = 0x08,
    Write = 0x09,
}

impl SmartPortCommand {
    /// Offset of the command's data payload within the raw request.
    ///
    /// Only commands that carry bulk data from the host have one: a
    /// `WriteBlock` carries the 512-byte block after its block number, a
    /// `Control` carries the control list after its control code, and a
    /// `Write` carries bytes after its count and address.
    pub fn payload_offset(self) -> Option<usize> {
        match self {
            Self::WriteBlock => Some(6),
            Self::Control => Some(4),
            Self::Write => Some(8),
            _ => None,
        }
    }

    /// Short human-readable name for log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::ReadBlock => "read-block",
            Self::WriteBlock => "write-block",
            Self::Format => "format",
            Self::Control => "control",
            Self::Init => "init",
            Self::Open => "open",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl TryFrom<u8> for SmartPortCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Status),
            0x01 => Ok(Self::ReadBlock),
            0x02 => Ok(Self::WriteBlock),
            0x03 => Ok(Self::Format),
            0x04 => Ok(Self::Control),
            0x05 => Ok(Self::Init),
            0x06 => Ok(Self::Open),
            0x07 => Ok(Self::Close),
            0x08 => Ok(Self::Read),
            0x09 => Ok(Self::Write),
            other => Err(other),
        }
    }
}

/// Bus packet type the host is answering with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Command = 0x80,
    Status = 0x81,
    Data = 0x82,
}

impl PacketType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Status => "status",
            Self::Data => "data",
        }
    }
}

/// A decoded request from the server.
///
/// Built by [`crate::protocol::codec::decode_request`].  The raw bytes are
/// kept so the command packet and payload can be sliced out on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub(crate) sequence: u8,
    pub(crate) command: SmartPortCommand,
    pub(crate) unit: u8,
    pub(crate) raw: Vec<u8>,
}

impl Request {
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn command(&self) -> SmartPortCommand {
        self.command
    }

    /// SmartPort unit number the request is addressed to.
    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The command's data payload, or an empty slice when the command carries
    /// none or the packet was truncated before it.
    pub fn payload(&self) -> &[u8] {
        match self.command.payload_offset() {
            Some(offset) if self.raw.len() > offset => &self.raw[offset..],
            _ => &[],
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload().len()
    }

    /// Copies the payload into `out`, truncating to `out.len()`.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_payload(&self, out: &mut [u8]) -> usize {
        let payload = self.payload();
        let n = payload.len().min(out.len());
        out[..n].copy_from_slice(&payload[..n]);
        n
    }

    /// The first [`COMMAND_PACKET_SIZE`] raw bytes, zero-padded when the
    /// request is shorter.
    pub fn command_packet(&self) -> [u8; COMMAND_PACKET_SIZE] {
        let mut packet = [0u8; COMMAND_PACKET_SIZE];
        let n = self.raw.len().min(COMMAND_PACKET_SIZE);
        packet[..n].copy_from_slice(&self.raw[..n]);
        packet
    }

    /// Status code for `Status` requests, control code for `Control` requests.
    pub fn status_code(&self) -> Option<u8> {
        match self.command {
            SmartPortCommand::Status | SmartPortCommand::Control => self.raw.get(3).copied(),
            _ => None,
        }
    }

    /// 24-bit block number for `ReadBlock` and `WriteBlock` requests.
    pub fn block_number(&self) -> Option<u32> {
        match self.command {
            SmartPortCommand::ReadBlock | SmartPortCommand::WriteBlock => {
                self.raw.get(3..6).map(read_u24_le)
            }
            _ => None,
        }
    }

    /// Byte count for `Read` and `Write` requests.
    pub fn byte_count(&self) -> Option<u16> {
        match self.command {
            SmartPortCommand::Read | SmartPortCommand::Write => self
                .raw
                .get(3..5)
                .map(|b| u16::from_le_bytes([b[0], b[1]])),
            _ => None,
        }
    }

    /// 24-bit device address for `Read` and `Write` requests.
    pub fn address(&self) -> Option<u32> {
        match self.command {
            SmartPortCommand::Read | SmartPortCommand::Write => {
                self.raw.get(5..8).map(read_u24_le)
            }
            _ => None,
        }
    }

    /// Builds the response to this request.
    pub fn create_response(&self, source: u8, status: u8, data: &[u8]) -> Response {
        Response {
            sequence: self.sequence,
            command: self.command,
            source,
            status,
            payload: data.to_vec(),
        }
    }
}

fn read_u24_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// A response bound to the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub(crate) sequence: u8,
    pub(crate) command: SmartPortCommand,
    pub(crate) source: u8,
    pub(crate) status: u8,
    pub(crate) payload: Vec<u8>,
}

impl Response {
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn command(&self) -> SmartPortCommand {
        self.command
    }

    pub fn source(&self) -> u8 {
        self.source
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
