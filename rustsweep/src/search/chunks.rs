use std::borrow::Cow;
use std::io::{self, BufRead};
use std::path::Path;
use tracing::warn;

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};

/// Default size of the per-line buffer, including room for a terminator
pub const DEFAULT_LINE_BUFFER: usize = 1024;

/// Smallest usable buffer: one full UTF-8 sequence plus a terminator
const MIN_LINE_BUFFER: usize = 5;

/// Reads a stream as bounded line chunks.
///
/// A chunk is either a full line including its `\n`, or the first
/// `capacity - 1` bytes of a longer line; the rest of that line arrives in
/// the following chunks. A chunk never ends inside a UTF-8 sequence: an
/// incomplete trailing sequence is carried over to the next chunk.
pub struct LineChunks<R> {
    reader: R,
    limit: usize,
    buf: Vec<u8>,
    carry: Vec<u8>,
}

impl<R: BufRead> LineChunks<R> {
    pub fn new(reader: R, capacity: usize) -> Self {
        let limit = capacity.max(MIN_LINE_BUFFER) - 1;
        Self {
            reader,
            limit,
            buf: Vec::with_capacity(limit),
            carry: Vec::new(),
        }
    }

    /// Returns the next chunk, or `None` at end of stream
    pub fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        self.buf.clear();
        self.buf.append(&mut self.carry);

        let mut terminated = false;
        while self.buf.len() < self.limit {
            let consumed = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    break;
                }
                let room = self.limit - self.buf.len();
                let window = &available[..available.len().min(room)];
                match window.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.buf.extend_from_slice(&window[..=i]);
                        terminated = true;
                        i + 1
                    }
                    None => {
                        self.buf.extend_from_slice(window);
                        window.len()
                    }
                }
            };
            self.reader.consume(consumed);
            if terminated {
                break;
            }
        }

        if self.buf.is_empty() {
            return Ok(None);
        }

        if !terminated && self.buf.len() >= self.limit {
            let tail = incomplete_tail(&self.buf);
            if tail > 0 {
                self.carry = self.buf.split_off(self.buf.len() - tail);
            }
        }

        Ok(Some(self.buf.as_slice()))
    }
}

/// Length of a UTF-8 sequence cut off at the end of `buf`, or 0.
///
/// Only the last three bytes are inspected, so invalid bytes earlier in the
/// buffer do not hide a valid sequence that straddles the split.
fn incomplete_tail(buf: &[u8]) -> usize {
    for back in 1..=buf.len().min(3) {
        let byte = buf[buf.len() - back];
        let width = match byte {
            0x80..=0xBF => continue,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Splits a chunk into its content and its `\n` terminator, if any
pub fn split_terminator(chunk: &str) -> (&str, &str) {
    match chunk.strip_suffix('\n') {
        Some(content) => (content, "\n"),
        None => (chunk, ""),
    }
}

/// Decodes a chunk according to the encoding mode
pub fn decode_chunk<'a>(
    bytes: &'a [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> SearchResult<Cow<'a, str>> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| SearchError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            if let Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow)
        }
    }
}
