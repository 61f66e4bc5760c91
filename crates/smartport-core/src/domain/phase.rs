//! Bus phase codes and command mode.
//!
//! The host samples the four SmartPort phase lines on every bus tick.  The
//! bridge answers with one of three line patterns:
//!
//! | Phase     | Lines (PH3..PH0) | Meaning                                 |
//! |-----------|------------------|-----------------------------------------|
//! | `Idle`    | `0000`           | nothing queued                          |
//! | `Enabled` | `1010`           | a command packet is staged for the host |
//! | `Reset`   | `0101`           | the bridge was reset by a control frame |

/// Phase-line pattern returned to the host bus loop on each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Enabled,
    Reset,
}

impl Phase {
    pub const IDLE_CODE: u8 = 0b0000;
    pub const ENABLED_CODE: u8 = 0b1010;
    pub const RESET_CODE: u8 = 0b0101;

    /// The raw phase-line bit pattern.
    pub fn code(self) -> u8 {
        match self {
            Self::Idle => Self::IDLE_CODE,
            Self::Enabled => Self::ENABLED_CODE,
            Self::Reset => Self::RESET_CODE,
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.code()
    }
}

/// Whether a command packet is waiting for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandMode {
    #[default]
    Standby,
    Command,
}
