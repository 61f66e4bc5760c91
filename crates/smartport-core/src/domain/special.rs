//! Reserved 4-byte control sequences.
//!
//! The server can send a bare 4-byte frame to control the bridge itself
//! rather than the emulated device.  A 4-byte frame is looked up here before
//! it is decoded as a SmartPort request; a miss falls through to the normal
//! decode path.
//!
//! Note that a 4-byte SmartPort request can collide with an entry in this
//! table.  The table wins.

/// Length of every special sequence.
pub const SPECIAL_SEQUENCE_LEN: usize = 4;

pub type SpecialSequence = [u8; SPECIAL_SEQUENCE_LEN];

/// Tears down and re-establishes the network connection.
pub const REBOOT_SEQUENCE: SpecialSequence = [0xFF, 0x00, 0x00, 0xFF];

/// Control actions the server can trigger out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialCommand {
    Reboot,
}

const STANDARD_ENTRIES: &[(SpecialSequence, SpecialCommand)] =
    &[(REBOOT_SEQUENCE, SpecialCommand::Reboot)];

/// Immutable mapping from reserved sequences to control actions.
#[derive(Debug, Clone, Copy)]
pub struct SpecialCommandTable {
    entries: &'static [(SpecialSequence, SpecialCommand)],
}

impl SpecialCommandTable {
    /// The table of sequences the bridge understands.
    pub const fn standard() -> Self {
        Self {
            entries: STANDARD_ENTRIES,
        }
    }

    /// Looks up `raw` if it is exactly [`SPECIAL_SEQUENCE_LEN`] bytes long.
    ///
    /// Buffers of any other length never match.
    pub fn lookup(&self, raw: &[u8]) -> Option<SpecialCommand> {
        let key: &SpecialSequence = raw.try_into().ok()?;
        self.entries
            .iter()
            .find(|(sequence, _)| sequence == key)
            .map(|&(_, command)| command)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SpecialCommandTable {
    fn default() -> Self {
        Self::standard()
    }
}
