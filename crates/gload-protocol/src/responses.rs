//! Reply parsing for the GRBL serial line.
//!
//! Replies from the controller are one of:
//! - An acknowledgement: `ok`
//! - A rejection: `error:<code>`
//! - A status report: `<Idle,...>`, `<Run,...>`, `<Alarm,...>` and friends
//! - Anything else (startup banners, feedback messages)

use crate::constants::{ALARM_PREFIX, ERROR_PREFIX, IDLE_PREFIX, OK_RESPONSE, RUN_PREFIX};

/// Controller state as reported by a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Idle and accepting commands.
    Ready,
    /// Executing motion.
    Running,
    /// Locked out until unlocked or reset.
    Alarm,
    /// Any other reply (hold, jog, homing, partial report, banner).
    Unknown,
}

impl DeviceStatus {
    /// Classify a status report by its prefix.
    ///
    /// Only the leading bytes are inspected; the rest of the report (machine
    /// position, buffer state) is ignored.
    pub fn from_report(text: &str) -> DeviceStatus {
        if text.starts_with(RUN_PREFIX) {
            DeviceStatus::Running
        } else if text.starts_with(ALARM_PREFIX) {
            DeviceStatus::Alarm
        } else if text.starts_with(IDLE_PREFIX) {
            DeviceStatus::Ready
        } else {
            DeviceStatus::Unknown
        }
    }

    /// Check if the controller is still executing motion.
    pub fn is_running(&self) -> bool {
        matches!(self, DeviceStatus::Running)
    }
}

/// Parsed reply from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command accepted.
    Ok,
    /// Command rejected. Holds the text after `error:`.
    Error(String),
    /// A status report.
    Status(DeviceStatus),
    /// Unrecognized reply.
    Unknown(String),
}

impl Response {
    /// Parse a reply.
    ///
    /// Prefix checks are anchored at the very first byte; leading whitespace
    /// is not skipped. Trailing terminators are stripped.
    pub fn parse(text: &str) -> Response {
        let text = text.trim_end_matches(['\r', '\n']);

        if text == OK_RESPONSE {
            return Response::Ok;
        }

        if let Some(code) = text.strip_prefix(ERROR_PREFIX) {
            return Response::Error(code.trim().to_string());
        }

        if text.starts_with('<') {
            return Response::Status(DeviceStatus::from_report(text));
        }

        Response::Unknown(text.to_string())
    }

    /// Parse raw reply bytes, decoding lossily.
    pub fn from_bytes(data: &[u8]) -> Response {
        Response::parse(&String::from_utf8_lossy(data))
    }

    /// Check if this is an OK response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Get the error code if this is an Error response.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Response::Error(code) => Some(code),
            _ => None,
        }
    }

    /// Get the status if this is a status report.
    pub fn as_status(&self) -> Option<DeviceStatus> {
        match self {
            Response::Status(status) => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        assert_eq!(Response::parse("ok\r\n"), Response::Ok);
        assert!(Response::parse("ok").is_ok());
    }

    #[test]
    fn test_parse_error() {
        let response = Response::parse("error:9\n");
        assert!(response.is_error());
        assert_eq!(response.as_error(), Some("9"));
    }

    #[test]
    fn test_error_prefix_is_anchored() {
        assert_eq!(
            Response::parse(" error:9"),
            Response::Unknown(" error:9".to_string())
        );
        assert!(!Response::parse("Error: bad").is_error());
    }

    #[test]
    fn test_parse_status_reports() {
        assert_eq!(
            Response::parse("<Idle,MPos:0.000,0.000,0.000,WPos:0.000,0.000,0.000>\r\n"),
            Response::Status(DeviceStatus::Ready)
        );
        assert_eq!(
            Response::parse("<Run,MPos:5.000,0.000,0.000>").as_status(),
            Some(DeviceStatus::Running)
        );
        assert_eq!(
            Response::parse("<Alarm,MPos:0.000,0.000,0.000>").as_status(),
            Some(DeviceStatus::Alarm)
        );
        assert_eq!(
            Response::parse("<Hold,MPos:0.000,0.000,0.000>").as_status(),
            Some(DeviceStatus::Unknown)
        );
    }

    #[test]
    fn test_status_prefix_needs_comma() {
        assert_eq!(DeviceStatus::from_report("<Run>"), DeviceStatus::Unknown);
        assert_eq!(DeviceStatus::from_report("<Alarm"), DeviceStatus::Unknown);
    }

    #[test]
    fn test_parse_banner() {
        assert_eq!(
            Response::from_bytes(b"Grbl 0.9j ['$' for help]\r\n"),
            Response::Unknown("Grbl 0.9j ['$' for help]".to_string())
        );
    }
}
