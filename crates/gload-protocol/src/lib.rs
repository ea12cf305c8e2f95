//! GRBL Serial Line Protocol
//!
//! This crate provides types and utilities for talking to GRBL-class motion
//! controllers over their serial interface. It performs no I/O itself: the
//! runner crate owns the port and uses this vocabulary to build requests and
//! interpret replies.
//!
//! # Protocol Overview
//!
//! The protocol is a strict request/response exchange of ASCII text:
//!
//! - **G-code lines** (host → controller): one command per line, terminated with `\n`
//! - **Acknowledgements** (controller → host): `ok`, or `error:<code>` on failure
//! - **Status query**: the single character `?`, answered with a report such as
//!   `<Idle,MPos:0.000,0.000,0.000,...>`
//! - **Realtime control**: the soft-reset byte `0x18` (ctrl-x)
//! - **Unlock**: `$X\n` clears an alarm lockout
//!
//! # Example
//!
//! ```rust
//! use gload_protocol::{classify, ClassifiedLine, DeviceStatus, Response, MAX_GCODE_LINE};
//!
//! let line = classify("G1 X10 (move right)\n", MAX_GCODE_LINE);
//! assert_eq!(line, ClassifiedLine::Valid("G1 X10 \n".to_string()));
//!
//! let response = Response::parse("<Run,MPos:1.000,0.000,0.000>");
//! assert_eq!(response, Response::Status(DeviceStatus::Running));
//! ```

mod commands;
mod constants;
mod line;
mod responses;

pub use commands::*;
pub use constants::*;
pub use line::*;
pub use responses::*;
