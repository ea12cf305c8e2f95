//! Error types for the loader.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the controller or preparing a run.
///
/// Protocol outcomes such as a busy or alarmed controller are not errors;
/// they are reported through [`crate::TransferOutcome`].
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The serial device could not be opened or configured.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Device path that was requested.
        path: String,
        /// Underlying driver error.
        #[source]
        source: serialport::Error,
    },

    /// No reply arrived within the retry bound.
    #[error("timeout waiting for response after {attempts} read attempts")]
    Timeout {
        /// Number of empty read attempts made.
        attempts: u32,
    },

    /// I/O error on the port or the input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was used after it was closed.
    #[error("serial port already closed")]
    PortClosed,

    /// Baud rate not supported by the controller.
    #[error("baudrate {0} not supported")]
    UnsupportedBaud(u32),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::LoaderConfig`].
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl LoaderError {
    /// Check if this error is a communication timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoaderError::Timeout { .. })
    }
}

/// Result type alias for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
