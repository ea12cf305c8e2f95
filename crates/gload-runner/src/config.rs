//! Loader configuration.
//!
//! A [`LoaderConfig`] describes the serial link and protocol timing. It can be
//! built from defaults, loaded from a YAML file, and then overridden from the
//! command line. [`StreamOptions`] holds the per-run policy flags. Both are
//! resolved once and handed to the controller as immutable values.

use std::path::Path;
use std::time::Duration;

use gload_protocol::MAX_GCODE_LINE;
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};

/// Default serial device.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
/// Default baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;
/// Baud rates accepted by the controller firmware.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9_600, 19_200, 38_400, 57_600, 115_200];

/// Consecutive empty reads before a reply is declared lost.
pub const READ_RETRY_LIMIT: u32 = 50;
/// Per-read timeout quantum of the serial port.
pub const READ_TIMEOUT_QUANTUM: Duration = Duration::from_millis(100);
/// Interval between status polls while waiting for motion to finish.
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Time the controller is given to reboot after a soft reset.
pub const RESET_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Serial link and protocol timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Serial device path.
    pub device: String,
    /// Baud rate, one of [`SUPPORTED_BAUD_RATES`].
    pub baud: u32,
    /// Longest accepted G-code line in bytes, excluding the terminator.
    pub max_line_len: usize,
    /// Consecutive empty reads before timing out.
    pub read_retries: u32,
    /// Per-read timeout quantum in milliseconds.
    pub read_timeout_ms: u64,
    /// Completion poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Settle delay after a soft reset in milliseconds.
    pub reset_settle_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            max_line_len: MAX_GCODE_LINE,
            read_retries: READ_RETRY_LIMIT,
            read_timeout_ms: READ_TIMEOUT_QUANTUM.as_millis() as u64,
            poll_interval_ms: COMPLETION_POLL_INTERVAL.as_millis() as u64,
            reset_settle_ms: RESET_SETTLE_DELAY.as_millis() as u64,
        }
    }
}

impl LoaderConfig {
    /// Load a configuration from a YAML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> LoaderResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> LoaderResult<Self> {
        if text.trim().is_empty() {
            return Ok(LoaderConfig::default());
        }
        let config: LoaderConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Set the device path.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the baud rate.
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> LoaderResult<()> {
        if self.device.is_empty() {
            return Err(LoaderError::Config("device path is empty".to_string()));
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud) {
            return Err(LoaderError::UnsupportedBaud(self.baud));
        }
        if self.max_line_len == 0 {
            return Err(LoaderError::Config("max_line_len must be positive".to_string()));
        }
        if self.read_retries == 0 {
            return Err(LoaderError::Config("read_retries must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(LoaderError::Config("read_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Per-read timeout quantum.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Completion poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Soft reset settle delay.
    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    /// Total time a single reply is waited for.
    pub fn response_timeout(&self) -> Duration {
        self.read_timeout() * self.read_retries
    }
}

/// Per-run policy flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Unlock the controller if it reports an alarm at preflight.
    pub unlock_alarm: bool,
    /// Keep streaming when the controller rejects a line.
    pub ignore_errors: bool,
    /// Do not wait for motion to finish after the last line.
    pub no_wait: bool,
    /// Soft reset and unlock before the preflight check.
    pub reset: bool,
}
