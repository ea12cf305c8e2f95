//! G-code streaming loader for GRBL controllers.
//!
//! This crate drives a single transfer of a G-code program to a controller
//! over a serial line:
//!
//! - [`transport`]: the serial port with bounded-retry reads
//! - [`monitor`]: status query and unlock
//! - [`reset`]: best-effort soft reset
//! - [`controller`]: the transfer state machine and its error-stop policy
//! - [`check`]: classification without a controller
//!
//! With the `mock` feature, `mock::ScriptedPort` answers writes from a script
//! in place of a serial device.
//!
//! The `gload` binary wires these to the command line.

pub mod check;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod monitor;
pub mod reset;
pub mod transport;

pub use check::{check_program, CheckSummary};
pub use config::{LoaderConfig, StreamOptions};
pub use controller::{AbortReason, Phase, StreamingController, TransferOutcome, TransferReport, TransferStats};
pub use error::{LoaderError, LoaderResult};
pub use input::{LineReader, RawLine};
pub use transport::{SerialTransport, TransportStats};
