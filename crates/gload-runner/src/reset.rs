//! Soft reset and unlock.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use gload_protocol::{Command, Response};
use tracing::{debug, info};

use crate::error::LoaderResult;
use crate::transport::SerialTransport;

/// What the controller said during a reset sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// First chunk of the startup banner, if one arrived.
    pub banner: Option<String>,
    /// Reply to the unlock command, if one arrived.
    pub unlock_reply: Option<Response>,
}

/// Soft reset the controller, then unlock it.
///
/// Sends ctrl-x, waits `settle` for the interpreter to reboot and reads once,
/// then sends `$X` and reads once. Failed reads, timed out or not, leave the
/// corresponding report field empty and the sequence continues. Only
/// failures to write reach the caller, who is expected to log and discard
/// them.
pub fn reset_and_unlock<P: Read + Write>(
    transport: &mut SerialTransport<P>,
    settle: Duration,
) -> LoaderResult<ResetReport> {
    info!("Soft resetting controller");
    let mut report = ResetReport::default();

    transport.send(&Command::SoftReset)?;
    if !settle.is_zero() {
        thread::sleep(settle);
    }
    match transport.read_response() {
        Ok(data) => {
            let banner = String::from_utf8_lossy(&data).trim().to_string();
            debug!("Reset banner: {:?}", banner);
            report.banner = Some(banner);
        }
        Err(e) if e.is_timeout() => debug!("No banner after reset"),
        Err(e) => debug!("Reading reset banner failed: {}", e),
    }

    transport.send(&Command::Unlock)?;
    match transport.read_response() {
        Ok(data) => {
            let response = Response::from_bytes(&data);
            debug!("Unlock reply after reset: {:?}", response);
            report.unlock_reply = Some(response);
        }
        Err(e) if e.is_timeout() => debug!("No reply to unlock after reset"),
        Err(e) => debug!("Reading unlock reply failed: {}", e),
    }

    Ok(report)
}
