//! Scripted in-memory serial port.
//!
//! [`ScriptedPort`] stands in for a controller in tests. Each
//! write consumes the next [`Reply`] from its script, and subsequent reads
//! return that reply the way a serial driver would: possibly after a few
//! empty timeout quanta, possibly split into several chunks. A
//! [`PortProbe`] handle stays with the caller to inspect traffic after the
//! port itself has been moved into a transport.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted reaction to one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Reply with `chunks`, one per read, after `delay` empty reads.
    Chunks {
        /// Data returned by successive reads.
        chunks: Vec<Vec<u8>>,
        /// Empty reads before the first chunk arrives.
        delay: u32,
    },
    /// Never reply.
    Silence,
    /// Fail the next read with this error kind.
    Fail(io::ErrorKind),
}

impl Reply {
    /// Reply with `text` on the first read.
    pub fn data(text: &str) -> Self {
        Reply::delayed(text, 0)
    }

    /// Reply with `text` after `delay` empty reads.
    pub fn delayed(text: &str, delay: u32) -> Self {
        Reply::Chunks {
            chunks: vec![text.as_bytes().to_vec()],
            delay,
        }
    }

    /// Reply split across several reads.
    pub fn chunked(parts: &[&str]) -> Self {
        Reply::Chunks {
            chunks: parts.iter().map(|p| p.as_bytes().to_vec()).collect(),
            delay: 0,
        }
    }

    /// `ok` acknowledgement.
    pub fn ok() -> Self {
        Reply::data("ok\r\n")
    }

    /// Idle status report.
    pub fn idle() -> Self {
        Reply::data("<Idle,MPos:0.000,0.000,0.000,WPos:0.000,0.000,0.000>\r\n")
    }

    /// Run status report.
    pub fn running() -> Self {
        Reply::data("<Run,MPos:1.000,0.000,0.000,WPos:1.000,0.000,0.000>\r\n")
    }

    /// Alarm status report.
    pub fn alarm() -> Self {
        Reply::data("<Alarm,MPos:0.000,0.000,0.000,WPos:0.000,0.000,0.000>\r\n")
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    writes: Vec<Vec<u8>>,
    read_attempts: u32,
    close_count: u32,
    unused_replies: usize,
}

/// Observer for a [`ScriptedPort`].
#[derive(Debug, Clone, Default)]
pub struct PortProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl PortProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        // Recorded traffic stays readable after a poisoning panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// All written bytes as text.
    pub fn written_text(&self) -> String {
        let state = self.lock();
        let bytes: Vec<u8> = state.writes.iter().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of writes.
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Number of read calls, empty or not.
    pub fn read_attempts(&self) -> u32 {
        self.lock().read_attempts
    }

    /// Number of times the port was dropped.
    pub fn close_count(&self) -> u32 {
        self.lock().close_count
    }

    /// Script entries that were never consumed, as of the port's drop.
    pub fn unused_replies(&self) -> usize {
        self.lock().unused_replies
    }
}

/// In-memory port that answers writes from a script.
#[derive(Debug)]
pub struct ScriptedPort {
    script: VecDeque<Reply>,
    inbox: VecDeque<Vec<u8>>,
    delay: u32,
    failure: Option<io::ErrorKind>,
    probe: PortProbe,
}

impl ScriptedPort {
    /// Create a port answering writes with `script`, in order.
    pub fn new(script: Vec<Reply>) -> (ScriptedPort, PortProbe) {
        let probe = PortProbe::default();
        let port = ScriptedPort {
            script: script.into(),
            inbox: VecDeque::new(),
            delay: 0,
            failure: None,
            probe: probe.clone(),
        };
        (port, probe)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.probe.lock().writes.push(buf.to_vec());

        match self.script.pop_front() {
            Some(Reply::Chunks { chunks, delay }) => {
                self.inbox.extend(chunks.into_iter().filter(|c| !c.is_empty()));
                self.delay = delay;
            }
            Some(Reply::Fail(kind)) => self.failure = Some(kind),
            Some(Reply::Silence) | None => {}
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.probe.lock().read_attempts += 1;

        if let Some(kind) = self.failure.take() {
            return Err(io::Error::new(kind, "scripted failure"));
        }

        if self.delay > 0 {
            self.delay -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "quantum elapsed"));
        }

        let Some(chunk) = self.inbox.front_mut() else {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "quantum elapsed"));
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        *chunk = chunk.split_off(n);
        if chunk.is_empty() {
            self.inbox.pop_front();
        }
        Ok(n)
    }
}

impl Drop for ScriptedPort {
    fn drop(&mut self) {
        let mut state = self.probe.lock();
        state.close_count += 1;
        state.unused_replies = self.script.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_follows_write() {
        let (mut port, probe) = ScriptedPort::new(vec![Reply::ok()]);
        let mut buf = [0u8; 16];

        assert!(port.read(&mut buf).is_err());
        port.write_all(b"G0\n").unwrap();
        let n = port.read(&mut buf).unwrap();

        assert_eq!(&buf[..n], b"ok\r\n");
        assert_eq!(probe.written_text(), "G0\n");
        assert_eq!(probe.read_attempts(), 2);
    }

    #[test]
    fn test_scripted_failure_is_returned_once() {
        let (mut port, _probe) = ScriptedPort::new(vec![Reply::Fail(io::ErrorKind::BrokenPipe)]);
        let mut buf = [0u8; 16];

        port.write_all(b"?").unwrap();
        let err = port.read(&mut buf).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(port.read(&mut buf).unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_drop_is_recorded() {
        let (port, probe) = ScriptedPort::new(vec![Reply::ok(), Reply::ok()]);
        drop(port);
        assert_eq!(probe.close_count(), 1);
        assert_eq!(probe.unused_replies(), 2);
    }
}
