//! Protocol constants
//!
//! These constants define the control bytes, command strings, reply prefixes
//! and size limits used on the GRBL serial line.

// ============================================================================
// Requests (host → controller)
// ============================================================================

/// Realtime status query. Answered with a `<State,...>` report.
pub const STATUS_QUERY: u8 = b'?';
/// Realtime soft reset (ctrl-x). Reboots the command interpreter.
pub const SOFT_RESET: u8 = 0x18;
/// Kill-alarm-lock command, including its terminator.
pub const UNLOCK_COMMAND: &str = "$X\n";

// ============================================================================
// Replies (controller → host)
// ============================================================================

/// Prefix of a status report while the controller is idle.
pub const IDLE_PREFIX: &str = "<Idle,";
/// Prefix of a status report while a motion program is executing.
pub const RUN_PREFIX: &str = "<Run,";
/// Prefix of a status report while the controller is locked out.
pub const ALARM_PREFIX: &str = "<Alarm,";
/// Prefix of a rejected command acknowledgement.
pub const ERROR_PREFIX: &str = "error:";
/// Accepted command acknowledgement.
pub const OK_RESPONSE: &str = "ok";

// ============================================================================
// Framing
// ============================================================================

/// Line terminator appended to every command line.
pub const LINE_TERMINATOR: char = '\n';
/// Opening marker of a parenthesized G-code comment.
pub const COMMENT_OPEN: char = '(';
/// Closing marker of a parenthesized G-code comment.
pub const COMMENT_CLOSE: char = ')';

// ============================================================================
// Limits
// ============================================================================

/// Maximum G-code line length in bytes, excluding the terminator.
pub const MAX_GCODE_LINE: usize = 100;
/// Capacity of the buffer a single reply is read into.
pub const MAX_RESPONSE_LEN: usize = 128;
/// Slack added to the line limit when reading raw input, so that an
/// over-long line is still seen as over-long rather than silently split
/// at exactly the limit.
pub const RAW_LINE_SLACK: usize = 10;
