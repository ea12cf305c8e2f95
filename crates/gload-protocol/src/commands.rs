//! Requests that can be sent to the controller.
//!
//! The loader only ever needs four kinds of request:
//! - Realtime bytes (status query, soft reset), sent without a terminator
//! - The unlock command
//! - Normalized G-code lines

use crate::constants::{LINE_TERMINATOR, SOFT_RESET, STATUS_QUERY, UNLOCK_COMMAND};

/// A request to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `?` realtime status query.
    StatusQuery,
    /// `$X` kill alarm lock.
    Unlock,
    /// ctrl-x soft reset.
    SoftReset,
    /// A G-code line. The text is sent as-is if it already ends in a
    /// terminator, otherwise one is appended.
    Gcode(String),
}

impl Command {
    /// Encode the command to the bytes put on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::StatusQuery => vec![STATUS_QUERY],
            Command::SoftReset => vec![SOFT_RESET],
            Command::Unlock => UNLOCK_COMMAND.as_bytes().to_vec(),
            Command::Gcode(text) => {
                let mut buf = Vec::with_capacity(text.len() + 1);
                buf.extend_from_slice(text.as_bytes());
                if !text.ends_with(LINE_TERMINATOR) {
                    buf.push(LINE_TERMINATOR as u8);
                }
                buf
            }
        }
    }

    /// Check if the controller answers this command with exactly one reply.
    ///
    /// A soft reset is followed by a startup banner rather than a reply.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Command::SoftReset)
    }

    /// Printable form for logs.
    pub fn describe(&self) -> String {
        match self {
            Command::StatusQuery => "?".to_string(),
            Command::SoftReset => "<ctrl-x>".to_string(),
            Command::Unlock => "$X".to_string(),
            Command::Gcode(text) => text.trim_end().to_string(),
        }
    }
}
