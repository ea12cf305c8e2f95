//! Serial transport.
//!
//! [`SerialTransport`] wraps a byte port and enforces the strict
//! request/response discipline of the controller: every write is answered by
//! exactly one bounded-retry read before the next write. The port type is
//! generic so the same code drives a real `serialport` handle or the scripted
//! port in the `mock` module.

use std::io::{self, Read, Write};

use gload_protocol::{Command, MAX_RESPONSE_LEN};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};

/// Counters kept by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Number of writes issued.
    pub writes: u64,
    /// Bytes written.
    pub bytes_written: u64,
    /// Replies received.
    pub replies: u64,
    /// Bytes received.
    pub bytes_read: u64,
    /// Reads that ended in a timeout.
    pub timeouts: u64,
}

/// An open connection to the controller.
pub struct SerialTransport<P = Box<dyn SerialPort>> {
    port: Option<P>,
    /// Consecutive empty reads allowed per reply.
    retries: u32,
    /// A write has been issued and its reply not yet read.
    awaiting_reply: bool,
    stats: TransportStats,
}

impl SerialTransport<Box<dyn SerialPort>> {
    /// Open `path` at `baud` with the default timeout quantum and retry bound.
    pub fn open(path: &str, baud: u32) -> LoaderResult<Self> {
        let config = LoaderConfig::default().with_device(path).with_baud(baud);
        Self::open_configured(&config)
    }

    /// Open the device described by `config`.
    ///
    /// The line is set to raw 8N1 without flow control, and input that was
    /// pending before the open is discarded.
    pub fn open_configured(config: &LoaderConfig) -> LoaderResult<Self> {
        let open_error = |source| LoaderError::Open {
            path: config.device.clone(),
            source,
        };

        let port = serialport::new(config.device.as_str(), config.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .map_err(open_error)?;

        port.clear(ClearBuffer::Input).map_err(open_error)?;

        debug!(
            "Opened {} at {} baud (quantum {:?}, {} retries)",
            config.device, config.baud, config.read_timeout(), config.read_retries
        );

        Ok(SerialTransport::new(port, config.read_retries))
    }
}

impl<P: Read + Write> SerialTransport<P> {
    /// Wrap an already configured port.
    ///
    /// `retries` is the number of consecutive empty reads tolerated before a
    /// reply is declared lost.
    pub fn new(port: P, retries: u32) -> Self {
        SerialTransport {
            port: Some(port),
            retries: retries.max(1),
            awaiting_reply: false,
            stats: TransportStats::default(),
        }
    }

    /// Write raw bytes, returning the number written.
    pub fn write(&mut self, data: &[u8]) -> LoaderResult<usize> {
        if self.awaiting_reply {
            warn!("Write issued while a reply is still outstanding");
        }
        let port = self.port.as_mut().ok_or(LoaderError::PortClosed)?;
        port.write_all(data)?;
        port.flush()?;

        self.awaiting_reply = true;
        self.stats.writes += 1;
        self.stats.bytes_written += data.len() as u64;
        trace!("TX {} bytes: {:?}", data.len(), String::from_utf8_lossy(data));
        Ok(data.len())
    }

    /// Encode and write a command.
    pub fn send(&mut self, command: &Command) -> LoaderResult<usize> {
        self.write(&command.encode())
    }

    /// Read one reply.
    ///
    /// Each attempt waits at most one timeout quantum. The first attempt that
    /// yields data returns it immediately; partial replies are not
    /// reassembled. After `retries` consecutive empty attempts the call
    /// fails with [`LoaderError::Timeout`].
    pub fn read_response(&mut self) -> LoaderResult<Vec<u8>> {
        let retries = self.retries;
        let port = self.port.as_mut().ok_or(LoaderError::PortClosed)?;
        let mut buf = [0u8; MAX_RESPONSE_LEN];

        for attempt in 1..=retries {
            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    self.awaiting_reply = false;
                    self.stats.replies += 1;
                    self.stats.bytes_read += n as u64;
                    trace!("RX {} bytes after {} attempt(s): {:?}", n, attempt, String::from_utf8_lossy(&buf[..n]));
                    return Ok(buf[..n].to_vec());
                }
                Err(e) if is_empty_read(&e) => {}
                Err(e) => {
                    self.awaiting_reply = false;
                    return Err(e.into());
                }
            }
        }

        self.awaiting_reply = false;
        self.stats.timeouts += 1;
        debug!("No reply after {} read attempts", retries);
        Err(LoaderError::Timeout { attempts: retries })
    }

    /// Write a command and read its reply.
    pub fn request(&mut self, command: &Command) -> LoaderResult<Vec<u8>> {
        debug_assert!(command.expects_reply(), "{} is not answered", command.describe());
        self.send(command)?;
        self.read_response()
    }

    /// Release the port. Returns `true` if this call closed it.
    pub fn close(&mut self) -> bool {
        match self.port.take() {
            Some(port) => {
                drop(port);
                debug!(
                    "Closed serial port ({} writes, {} replies, {} timeouts)",
                    self.stats.writes, self.stats.replies, self.stats.timeouts
                );
                true
            }
            None => false,
        }
    }

    /// Check if the port is still open.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Check if a write is waiting for its reply.
    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Get the transport counters.
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Get the retry bound.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Whether an I/O error only means the quantum elapsed with no data.
fn is_empty_read(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
