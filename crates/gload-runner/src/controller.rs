//! Streaming controller.
//!
//! Drives one transfer through its phases:
//!
//! ```text
//! Init → Preflight → Streaming → Completing → Done
//!   └──────────┴──────────┴───────────┴──→ Aborted(reason)
//! ```
//!
//! The controller owns the serial transport and the input for the whole run.
//! Each phase is handled by its own method returning the next phase, and
//! [`StreamingController::run`] releases both resources exactly once
//! whichever phase the run ends in.

use std::fmt;
use std::io::{BufRead, Read, Write};
use std::thread;

use gload_protocol::{classify, ClassifiedLine, Command, DeviceStatus, ERROR_PREFIX};
use tracing::{debug, error, info, trace, warn};

use crate::config::{LoaderConfig, StreamOptions};
use crate::input::LineReader;
use crate::monitor;
use crate::reset;
use crate::transport::SerialTransport;

// ============================================================================
// Outcome Types
// ============================================================================

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A line exceeded the length limit, or the input could not be read.
    Validation,
    /// The controller stopped answering.
    Timeout,
    /// The controller was already executing a program.
    Busy,
    /// The controller is in alarm and unlocking was not allowed.
    Alarm,
    /// The controller rejected a line.
    DeviceError,
}

/// Terminal result of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every line was acknowledged.
    Completed,
    /// Aborted on an over-long line or unreadable input.
    AbortedValidation,
    /// Aborted because a reply never arrived.
    AbortedTimeout,
    /// Not started because the controller was busy.
    AbortedBusy,
    /// Not started because the controller is in alarm.
    AbortedAlarm,
    /// Aborted because the controller rejected a line.
    AbortedDeviceError,
}

impl From<AbortReason> for TransferOutcome {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::Validation => TransferOutcome::AbortedValidation,
            AbortReason::Timeout => TransferOutcome::AbortedTimeout,
            AbortReason::Busy => TransferOutcome::AbortedBusy,
            AbortReason::Alarm => TransferOutcome::AbortedAlarm,
            AbortReason::DeviceError => TransferOutcome::AbortedDeviceError,
        }
    }
}

impl TransferOutcome {
    /// Process exit code for this outcome.
    ///
    /// A busy controller is not a failure and exits with 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            TransferOutcome::Completed | TransferOutcome::AbortedBusy => 0,
            TransferOutcome::AbortedValidation => 1,
            TransferOutcome::AbortedTimeout => 2,
            TransferOutcome::AbortedAlarm => 3,
            TransferOutcome::AbortedDeviceError => 4,
        }
    }

    /// Check if the program was transferred completely.
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed)
    }

    /// Advice for the operator, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TransferOutcome::Completed => None,
            TransferOutcome::AbortedValidation => Some("stop sending commands to GRBL"),
            TransferOutcome::AbortedTimeout => {
                Some("communication error - check your device and baudrate settings")
            }
            TransferOutcome::AbortedBusy => {
                Some("GRBL is busy - try again later or use -r to stop/reset the machine")
            }
            TransferOutcome::AbortedAlarm => {
                Some("GRBL is in alarm state - use -a to unlock the machine")
            }
            TransferOutcome::AbortedDeviceError => {
                Some("gcode sending stopped - use -i to ignore errors")
            }
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransferOutcome::Completed => "completed",
            TransferOutcome::AbortedValidation => "aborted: line validation failed",
            TransferOutcome::AbortedTimeout => "aborted: communication timeout",
            TransferOutcome::AbortedBusy => "aborted: controller busy",
            TransferOutcome::AbortedAlarm => "aborted: controller in alarm state",
            TransferOutcome::AbortedDeviceError => "aborted: controller reported an error",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Optional reset before anything else.
    Init,
    /// Status check before the first line.
    Preflight,
    /// Sending lines one at a time.
    Streaming,
    /// Waiting for motion to finish.
    Completing,
    /// Finished successfully.
    Done,
    /// Stopped early.
    Aborted(AbortReason),
}

impl Phase {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Aborted(_))
    }

    /// Outcome of a terminal phase.
    pub fn outcome(&self) -> Option<TransferOutcome> {
        match self {
            Phase::Done => Some(TransferOutcome::Completed),
            Phase::Aborted(reason) => Some((*reason).into()),
            _ => None,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Input lines read.
    pub lines_read: usize,
    /// Lines sent to the controller.
    pub lines_sent: usize,
    /// Lines skipped as empty, comment or without command.
    pub lines_skipped: usize,
    /// Rejections that were ignored.
    pub errors_ignored: usize,
    /// G-code bytes sent.
    pub bytes_sent: usize,
    /// Status polls while waiting for completion.
    pub completion_polls: usize,
}

/// Result of [`StreamingController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// How the run ended.
    pub outcome: TransferOutcome,
    /// Phase the run was in when it ended.
    pub last_active: Phase,
    /// Counters.
    pub stats: TransferStats,
}

// ============================================================================
// Controller
// ============================================================================

/// Streams one program to one controller.
pub struct StreamingController<P: Read + Write, R: BufRead, W: Write> {
    config: LoaderConfig,
    options: StreamOptions,
    transport: SerialTransport<P>,
    input: LineReader<R>,
    console: W,
    stats: TransferStats,
}

impl<P: Read + Write, R: BufRead, W: Write> StreamingController<P, R, W> {
    /// Create a controller for one run.
    ///
    /// Status lines for the operator are written to `console`.
    pub fn new(
        config: LoaderConfig,
        options: StreamOptions,
        transport: SerialTransport<P>,
        input: LineReader<R>,
        console: W,
    ) -> Self {
        StreamingController {
            config,
            options,
            transport,
            input,
            console,
            stats: TransferStats::default(),
        }
    }

    /// Get the counters so far.
    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Run the transfer to a terminal phase and release the port and input.
    pub fn run(mut self) -> TransferReport {
        let mut phase = Phase::Init;
        let mut last_active = phase;

        while !phase.is_terminal() {
            last_active = phase;
            phase = self.step(phase);
        }

        self.release();

        let outcome = phase.outcome().unwrap_or(TransferOutcome::Completed);
        info!(
            "Transfer {} ({} lines read, {} sent, {} skipped)",
            outcome, self.stats.lines_read, self.stats.lines_sent, self.stats.lines_skipped
        );

        TransferReport {
            outcome,
            last_active,
            stats: self.stats,
        }
    }

    /// Perform one transition.
    ///
    /// Streaming advances one input line per call. Terminal phases are
    /// returned unchanged.
    pub fn step(&mut self, phase: Phase) -> Phase {
        let next = match phase {
            Phase::Init => self.init(),
            Phase::Preflight => self.preflight(),
            Phase::Streaming => self.stream_next_line(),
            Phase::Completing => self.complete(),
            Phase::Done | Phase::Aborted(_) => phase,
        };
        if next != phase {
            trace!("Phase {:?} -> {:?}", phase, next);
        }
        next
    }

    fn init(&mut self) -> Phase {
        if self.options.reset {
            // Best effort: a failed reset never fails the run.
            if let Err(e) = reset::reset_and_unlock(&mut self.transport, self.config.reset_settle()) {
                warn!("Reset failed, continuing: {}", e);
            }
        }
        Phase::Preflight
    }

    fn preflight(&mut self) -> Phase {
        match monitor::query_state(&mut self.transport, self.options.unlock_alarm) {
            Ok(DeviceStatus::Running) => {
                info!("Controller busy, not starting");
                Phase::Aborted(AbortReason::Busy)
            }
            Ok(DeviceStatus::Alarm) => {
                warn!("Controller in alarm state, unlock not permitted");
                Phase::Aborted(AbortReason::Alarm)
            }
            Ok(DeviceStatus::Ready) | Ok(DeviceStatus::Unknown) => {
                debug!("Controller ready");
                Phase::Streaming
            }
            Err(e) => {
                error!("Preflight status query failed: {}", e);
                Phase::Aborted(AbortReason::Timeout)
            }
        }
    }

    fn stream_next_line(&mut self) -> Phase {
        let raw = match self.input.next_line() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("End of input after {} lines", self.stats.lines_read);
                return Phase::Completing;
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                return Phase::Aborted(AbortReason::Validation);
            }
        };
        self.stats.lines_read += 1;

        let max_len = self.config.max_line_len;
        let text = match classify(&raw.text, max_len) {
            ClassifiedLine::Valid(text) => text,
            ClassifiedLine::TooLong => {
                self.say(format_args!(
                    "{:4}: skipping - line has more than {} chars",
                    raw.number, max_len
                ));
                warn!("Line {} too long, aborting", raw.number);
                return Phase::Aborted(AbortReason::Validation);
            }
            skipped => {
                self.stats.lines_skipped += 1;
                self.say(format_args!(
                    "{:4}: skipping - {}",
                    raw.number,
                    skipped.skip_reason().unwrap_or_default()
                ));
                return Phase::Streaming;
            }
        };

        self.send_line(raw.number, text)
    }

    /// Send one validated line and wait for its reply.
    fn send_line(&mut self, number: usize, text: String) -> Phase {
        let command = Command::Gcode(text);
        debug!("Sending line {}: {}", number, command.describe());

        let written = match self.transport.send(&command) {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to send line {}: {}", number, e);
                return Phase::Aborted(AbortReason::Timeout);
            }
        };
        self.stats.lines_sent += 1;
        self.stats.bytes_sent += written;

        let reply = match self.transport.read_response() {
            Ok(reply) => reply,
            Err(e) => {
                self.say(format_args!("{:4}: {:4} - no response", number, written));
                // Any read failure, not only a clean timeout, ends the run here.
                error!("No response to line {}: {}", number, e);
                return Phase::Aborted(AbortReason::Timeout);
            }
        };

        let reply = String::from_utf8_lossy(&reply).into_owned();
        self.say(format_args!("{:4}: {:4} - {}", number, written, reply.trim_end()));

        if reply.starts_with(ERROR_PREFIX) {
            if self.options.ignore_errors {
                self.stats.errors_ignored += 1;
                warn!("Line {} rejected ({}), ignoring", number, reply.trim_end());
            } else {
                warn!("Line {} rejected ({}), stopping", number, reply.trim_end());
                return Phase::Aborted(AbortReason::DeviceError);
            }
        }

        Phase::Streaming
    }

    fn complete(&mut self) -> Phase {
        if self.options.no_wait {
            debug!("Not waiting for motion to finish");
            return Phase::Done;
        }

        self.say(format_args!("machine is still working - please wait..."));
        loop {
            self.stats.completion_polls += 1;
            match monitor::query_state(&mut self.transport, false) {
                Ok(status) if status.is_running() => {
                    thread::sleep(self.config.poll_interval());
                }
                Ok(status) => {
                    debug!("Motion finished ({:?}) after {} polls", status, self.stats.completion_polls);
                    break;
                }
                Err(e) => {
                    warn!("Status poll failed, no longer waiting: {}", e);
                    break;
                }
            }
        }
        self.say(format_args!("done"));

        Phase::Done
    }

    fn release(&mut self) {
        let port_closed = self.transport.close();
        let input_closed = self.input.close();
        debug_assert!(port_closed && input_closed, "resources released twice");
        if let Err(e) = self.console.flush() {
            debug!("Failed to flush console: {}", e);
        }
    }

    /// Write one status line for the operator.
    fn say(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.console, "{}", args) {
            debug!("Failed to write status line: {}", e);
        }
    }
}
