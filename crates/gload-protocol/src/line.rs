//! G-code line classification.
//!
//! Every line read from a program is run through [`classify`] before anything
//! is sent to the controller. The classifier strips trailing inline comments,
//! normalizes the terminator and rejects lines the controller would not
//! accept (over-long lines, comment-only lines, malformed comments).

use crate::constants::{COMMENT_CLOSE, COMMENT_OPEN, LINE_TERMINATOR};

/// Result of classifying a single raw input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    /// Nothing but a terminator (or nothing at all).
    Empty,
    /// A comment with no command in front of it.
    Comment,
    /// No command characters, or a stray closing comment marker.
    NoCommand,
    /// Longer than the configured limit once normalized.
    TooLong,
    /// A command line ready to send, ending in exactly one `\n`.
    Valid(String),
}

impl ClassifiedLine {
    /// Check if this line should be sent to the controller.
    pub fn is_valid(&self) -> bool {
        matches!(self, ClassifiedLine::Valid(_))
    }

    /// Get the normalized command text if this line is valid.
    pub fn as_command(&self) -> Option<&str> {
        match self {
            ClassifiedLine::Valid(text) => Some(text),
            _ => None,
        }
    }

    /// Short human readable reason a line is skipped, `None` for valid lines.
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            ClassifiedLine::Empty => Some("line is empty"),
            ClassifiedLine::Comment => Some("comment"),
            ClassifiedLine::NoCommand => Some("not a valid gcode line"),
            ClassifiedLine::TooLong => Some("line is too long"),
            ClassifiedLine::Valid(_) => None,
        }
    }
}

fn is_terminator(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Whether `c` counts as part of a command (anything but blanks, terminators
/// and the comment opener).
fn is_command_char(c: char) -> bool {
    !matches!(c, '(' | ' ' | '\t' | '\r' | '\n')
}

/// Classify one raw line.
///
/// `max_len` is the longest accepted line in bytes, not counting the
/// terminator. The function is total: every input maps to exactly one
/// variant.
///
/// A closing marker `)` is only rejected once a command character has been
/// seen; before that it counts as a command character itself, so `)G1` is
/// sent while `G1)` is rejected.
pub fn classify(raw: &str, max_len: usize) -> ClassifiedLine {
    match raw.chars().next() {
        None => return ClassifiedLine::Empty,
        Some(c) if is_terminator(c) => return ClassifiedLine::Empty,
        Some(COMMENT_OPEN) => return ClassifiedLine::Comment,
        Some(_) => {}
    }

    let mut seen_command = false;
    let mut end = raw.len();

    for (i, c) in raw.char_indices() {
        if c == COMMENT_OPEN && !seen_command {
            return ClassifiedLine::Comment;
        }
        if c == COMMENT_CLOSE && seen_command {
            return ClassifiedLine::NoCommand;
        }
        if is_command_char(c) {
            seen_command = true;
        }
        if is_terminator(c) || c == COMMENT_OPEN {
            end = i;
            break;
        }
    }

    let mut normalized = String::with_capacity(end + 1);
    normalized.push_str(&raw[..end]);
    normalized.push(LINE_TERMINATOR);

    if normalized.len() > max_len + 1 {
        return ClassifiedLine::TooLong;
    }
    if !seen_command {
        return ClassifiedLine::NoCommand;
    }

    ClassifiedLine::Valid(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_GCODE_LINE;

    fn valid(text: &str) -> ClassifiedLine {
        ClassifiedLine::Valid(text.to_string())
    }

    #[test]
    fn test_empty_lines() {
        assert_eq!(classify("", MAX_GCODE_LINE), ClassifiedLine::Empty);
        assert_eq!(classify("\n", MAX_GCODE_LINE), ClassifiedLine::Empty);
        assert_eq!(classify("\r\n", MAX_GCODE_LINE), ClassifiedLine::Empty);
    }

    #[test]
    fn test_comment_lines() {
        assert_eq!(classify("(setup)\n", MAX_GCODE_LINE), ClassifiedLine::Comment);
        assert_eq!(classify("   (indented)\n", MAX_GCODE_LINE), ClassifiedLine::Comment);
        assert_eq!(classify("\t(tab)", MAX_GCODE_LINE), ClassifiedLine::Comment);
    }

    #[test]
    fn test_plain_command() {
        assert_eq!(classify("G0 X0 Y0\n", MAX_GCODE_LINE), valid("G0 X0 Y0\n"));
    }

    #[test]
    fn test_missing_terminator_is_added() {
        assert_eq!(classify("M3 S1000", MAX_GCODE_LINE), valid("M3 S1000\n"));
    }

    #[test]
    fn test_crlf_is_normalized() {
        assert_eq!(classify("G1 Z-1\r\n", MAX_GCODE_LINE), valid("G1 Z-1\n"));
    }

    #[test]
    fn test_inline_comment_is_stripped() {
        assert_eq!(classify("G1 X5 (cut)\n", MAX_GCODE_LINE), valid("G1 X5 \n"));
    }

    #[test]
    fn test_blank_line_is_no_command() {
        assert_eq!(classify("   \t\n", MAX_GCODE_LINE), ClassifiedLine::NoCommand);
    }

    #[test]
    fn test_stray_close_after_command() {
        assert_eq!(classify("G1 X5)\n", MAX_GCODE_LINE), ClassifiedLine::NoCommand);
    }

    #[test]
    fn test_leading_close_counts_as_command() {
        assert_eq!(classify(")G1\n", MAX_GCODE_LINE), valid(")G1\n"));
    }

    #[test]
    fn test_close_after_stripped_comment_is_ignored() {
        // Scanning stops at the opener, the closer is never looked at.
        assert_eq!(classify("G4 P1 (wait) X)\n", MAX_GCODE_LINE), valid("G4 P1 \n"));
    }

    #[test]
    fn test_too_long() {
        let line = "G".repeat(150);
        assert_eq!(classify(&line, MAX_GCODE_LINE), ClassifiedLine::TooLong);
    }

    #[test]
    fn test_length_boundary() {
        let at_limit = format!("{}\n", "X".repeat(MAX_GCODE_LINE));
        assert!(classify(&at_limit, MAX_GCODE_LINE).is_valid());

        let over_limit = format!("{}\n", "X".repeat(MAX_GCODE_LINE + 1));
        assert_eq!(classify(&over_limit, MAX_GCODE_LINE), ClassifiedLine::TooLong);
    }

    #[test]
    fn test_long_comment_tail_does_not_count() {
        let line = format!("G0 X1 ({})\n", "c".repeat(200));
        assert_eq!(classify(&line, MAX_GCODE_LINE), valid("G0 X1 \n"));
    }

    #[test]
    fn test_long_blank_line_is_too_long() {
        // Length is checked before the command check.
        let line = format!("{}\n", " ".repeat(MAX_GCODE_LINE + 5));
        assert_eq!(classify(&line, MAX_GCODE_LINE), ClassifiedLine::TooLong);
    }

    #[test]
    fn test_skip_reason() {
        assert_eq!(ClassifiedLine::Comment.skip_reason(), Some("comment"));
        assert_eq!(valid("G0\n").skip_reason(), None);
        assert_eq!(valid("G0\n").as_command(), Some("G0\n"));
    }
}
