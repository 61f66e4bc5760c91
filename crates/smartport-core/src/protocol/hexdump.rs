//! Hex dump formatting for frame-level debug logging.

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Formats `bytes` as offset-prefixed hex lines with an ASCII gutter.
///
/// ```rust
/// use smartport_core::protocol::hexdump;
///
/// let dump = hexdump(b"AB");
/// assert!(dump.starts_with("0000: 41 42"));
/// assert!(dump.ends_with("|AB|"));
/// ```
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (line_no, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        if line_no > 0 {
            out.push('\n');
        }
        // Writing into a String cannot fail.
        let _ = write!(out, "{:04x}:", line_no * BYTES_PER_LINE);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        for _ in chunk.len()..BYTES_PER_LINE {
            out.push_str("   ");
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('|');
    }
    out
}
