//! Domain types for the bus side of the bridge.
//!
//! These are pure values with no I/O: the phase codes the host bus loop sees,
//! the command mode it reads, and the table of reserved control sequences the
//! server can send instead of a SmartPort request.

pub mod phase;
pub mod special;

pub use phase::{CommandMode, Phase};
pub use special::{SpecialCommand, SpecialCommandTable, SpecialSequence, REBOOT_SEQUENCE};
