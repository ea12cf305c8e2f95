//! Bounded line input.
//!
//! [`LineReader`] pulls raw lines out of a program file in chunks of at most
//! `limit` bytes. A physical line longer than that is returned as several
//! chunks; the first one is already longer than any valid line, so the
//! classifier rejects it before the remainder is ever looked at.

use std::io::{self, BufRead, Read};

use gload_protocol::RAW_LINE_SLACK;
use tracing::debug;

/// One chunk of input, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Position of this chunk in the input.
    pub number: usize,
    /// Chunk text, including its terminator if one was read.
    pub text: String,
}

/// Reads bounded raw lines from a buffered source.
pub struct LineReader<R> {
    source: Option<R>,
    limit: usize,
    count: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    /// Create a reader whose chunks hold at most `limit` bytes.
    pub fn new(source: R, limit: usize) -> Self {
        let limit = limit.max(1);
        LineReader {
            source: Some(source),
            limit,
            count: 0,
            buf: Vec::with_capacity(limit),
        }
    }

    /// Create a reader sized for lines of at most `max_line_len` bytes.
    pub fn for_line_length(source: R, max_line_len: usize) -> Self {
        Self::new(source, max_line_len + RAW_LINE_SLACK)
    }

    /// Read the next chunk. Returns `Ok(None)` at end of input or after
    /// [`LineReader::close`].
    pub fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        self.buf.clear();
        let n = source
            .by_ref()
            .take(self.limit as u64)
            .read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }

        self.count += 1;
        Ok(Some(RawLine {
            number: self.count,
            text: String::from_utf8_lossy(&self.buf).into_owned(),
        }))
    }

    /// Number of chunks read so far.
    pub fn lines_read(&self) -> usize {
        self.count
    }

    /// Release the source. Returns `true` if this call released it.
    pub fn close(&mut self) -> bool {
        if self.source.take().is_some() {
            debug!("Closed input after {} lines", self.count);
            true
        } else {
            false
        }
    }

    /// Check if the source is still held.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
