//! Check-only mode.
//!
//! Classifies a whole program without touching the controller, printing one
//! status line per input line. Unlike a real transfer, an over-long line is
//! reported and checking continues.

use std::io::{BufRead, Write};

use gload_protocol::{classify, ClassifiedLine};
use tracing::info;

use crate::error::LoaderResult;
use crate::input::LineReader;

/// Per-class line counts of a checked program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    /// Lines that would be sent.
    pub valid: usize,
    /// Empty lines.
    pub empty: usize,
    /// Comment lines.
    pub comments: usize,
    /// Lines without a command.
    pub no_command: usize,
    /// Lines over the length limit.
    pub too_long: usize,
}

impl CheckSummary {
    /// Total number of lines checked.
    pub fn total(&self) -> usize {
        self.valid + self.empty + self.comments + self.no_command + self.too_long
    }

    /// Check if a transfer of this program would be aborted.
    pub fn would_abort(&self) -> bool {
        self.too_long > 0
    }

    fn record(&mut self, line: &ClassifiedLine) {
        match line {
            ClassifiedLine::Valid(_) => self.valid += 1,
            ClassifiedLine::Empty => self.empty += 1,
            ClassifiedLine::Comment => self.comments += 1,
            ClassifiedLine::NoCommand => self.no_command += 1,
            ClassifiedLine::TooLong => self.too_long += 1,
        }
    }
}

/// Classify every line of `reader`, writing a status line for each to `out`.
pub fn check_program<R: BufRead, W: Write>(
    reader: &mut LineReader<R>,
    out: &mut W,
    max_line_len: usize,
) -> LoaderResult<CheckSummary> {
    let mut summary = CheckSummary::default();

    while let Some(raw) = reader.next_line()? {
        let line = classify(&raw.text, max_line_len);
        summary.record(&line);

        match &line {
            ClassifiedLine::Valid(text) => {
                writeln!(out, "{:4}: {:4} - ok", raw.number, text.len())?;
            }
            ClassifiedLine::TooLong => {
                writeln!(
                    out,
                    "{:4}: skipping - line has more than {} chars",
                    raw.number, max_line_len
                )?;
                writeln!(out, "a transfer would stop sending commands here")?;
            }
            other => {
                writeln!(
                    out,
                    "{:4}: skipping - {}",
                    raw.number,
                    other.skip_reason().unwrap_or_default()
                )?;
            }
        }
    }

    info!(
        "Checked {} lines: {} valid, {} empty, {} comments, {} without command, {} too long",
        summary.total(),
        summary.valid,
        summary.empty,
        summary.comments,
        summary.no_command,
        summary.too_long
    );

    Ok(summary)
}
