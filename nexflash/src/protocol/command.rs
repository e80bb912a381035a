//! Panel instruction framing.
//!
//! ## Frame Format
//!
//! ```text
//! +----------------------+------+------+------+
//! |  ASCII instruction   | 0xFF | 0xFF | 0xFF |
//! +----------------------+------+------+------+
//! |      variable        |      terminator    |
//! +----------------------+--------------------+
//! ```

use std::fmt;

/// Three-byte instruction terminator.
pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Substring of the identification reply to `connect`.
pub const CONNECT_ACK: &[u8] = b"comok";

/// Byte the panel sends when a handshake or packet was accepted.
pub const ACK_TOKEN: u8 = 0x05;

/// Instructions the uploader sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Empty instruction; resets the panel's instruction parser.
    Empty,
    /// Identification request, answered with `comok...`.
    Connect,
    /// Enter download mode for `len` bytes at `baud`.
    Download {
        /// Payload length in bytes.
        len: u32,
        /// Baud rate to receive the payload at.
        baud: u32,
    },
    /// Soft reset.
    Reset,
}

impl Command {
    /// Instruction text without terminator.
    pub fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Connect => "connect".to_string(),
            Self::Download { len, baud } => format!("whmi-wri {len},{baud},0"),
            Self::Reset => "rest".to_string(),
        }
    }

    /// Encode the instruction for the wire.
    pub fn build(&self) -> Vec<u8> {
        let text = self.text();
        let mut frame = Vec::with_capacity(text.len() + TERMINATOR.len());
        frame.extend_from_slice(text.as_bytes());
        frame.extend_from_slice(&TERMINATOR);
        frame
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "<empty>"),
            _ => write!(f, "{}", self.text()),
        }
    }
}
