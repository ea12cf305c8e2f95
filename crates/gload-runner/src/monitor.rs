//! Device state monitor.
//!
//! Asks the controller for a status report and reduces it to the three states
//! the loader cares about. Used for the preflight check and for the
//! completion poll after the last line.

use std::io::{Read, Write};

use gload_protocol::{Command, DeviceStatus, Response};
use tracing::{debug, info, trace, warn};

use crate::error::LoaderResult;
use crate::transport::SerialTransport;

/// Query the controller state.
///
/// Sends `?` and classifies the reply:
/// - `<Run,...>` → [`DeviceStatus::Running`]
/// - `<Alarm,...>` → [`DeviceStatus::Alarm`], or, when `allow_unlock` is set,
///   `$X` is sent, its reply read, and [`DeviceStatus::Ready`] returned
/// - anything else, idle included → [`DeviceStatus::Ready`]
///
/// [`DeviceStatus::Unknown`] is never returned. Timeouts propagate.
pub fn query_state<P: Read + Write>(
    transport: &mut SerialTransport<P>,
    allow_unlock: bool,
) -> LoaderResult<DeviceStatus> {
    let reply = transport.request(&Command::StatusQuery)?;
    let text = String::from_utf8_lossy(&reply);
    trace!("Status reply: {:?}", text);

    let status = DeviceStatus::from_report(&text);
    match status {
        DeviceStatus::Running => Ok(DeviceStatus::Running),
        DeviceStatus::Alarm if !allow_unlock => Ok(DeviceStatus::Alarm),
        DeviceStatus::Alarm => {
            info!("Controller in alarm state, unlocking");
            unlock(transport)?;
            Ok(DeviceStatus::Ready)
        }
        DeviceStatus::Ready => Ok(DeviceStatus::Ready),
        DeviceStatus::Unknown => {
            debug!("Unrecognized status reply {:?}, treating as ready", text.trim_end());
            Ok(DeviceStatus::Ready)
        }
    }
}

/// Send `$X` and read its reply.
///
/// The reply is returned for logging only; a rejection is not an error here.
pub fn unlock<P: Read + Write>(transport: &mut SerialTransport<P>) -> LoaderResult<Response> {
    let reply = transport.request(&Command::Unlock)?;
    let response = Response::from_bytes(&reply);
    if response.is_error() {
        warn!("Unlock rejected: {:?}", response);
    } else {
        debug!("Unlock reply: {:?}", response);
    }
    Ok(response)
}
