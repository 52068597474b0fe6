//! Byte-stream reader
//!
//! The console has no framing, so the end of a response can only be
//! recognised by a pattern (the prompt) or by the line going quiet.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::serial_driver::{ReadEvent, SerialLink};

const READ_CHUNK: usize = 1024;

/// True if `needle` occurs anywhere in `haystack`
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Poll-driven accumulate-until-pattern primitive
#[derive(Debug, Clone)]
pub struct StreamReader {
    slice: Duration,
    drain_limit: Duration,
}

impl StreamReader {
    /// `slice` bounds each individual poll; `drain_limit` caps a drain on a
    /// line that never goes quiet.
    pub fn new(slice: Duration, drain_limit: Duration) -> Self {
        Self {
            slice: slice.max(Duration::from_millis(1)),
            drain_limit,
        }
    }

    /// Accumulate bytes until `pattern` appears or `timeout` elapses.
    ///
    /// Returns everything read, pattern included when found. On timeout,
    /// end of stream or a read error the partial data is returned.
    pub fn read_until<L>(&self, link: &mut L, pattern: &[u8], timeout: Duration) -> Vec<u8>
    where
        L: SerialLink + ?Sized,
    {
        self.read_until_any(link, &[pattern], timeout)
    }

    /// Like [`read_until`](Self::read_until), stopping at whichever of
    /// `patterns` shows up first.
    pub fn read_until_any<L>(&self, link: &mut L, patterns: &[&[u8]], timeout: Duration) -> Vec<u8>
    where
        L: SerialLink + ?Sized,
    {
        let longest = patterns.iter().map(|p| p.len()).max().unwrap_or(0);
        let deadline = Instant::now() + timeout;
        let mut buf = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = (deadline - now).min(self.slice);

            match link.poll_read(&mut chunk, wait) {
                Ok(ReadEvent::Data(n)) => {
                    // Only the tail can hold a new match.
                    let from = buf.len().saturating_sub(longest);
                    buf.extend_from_slice(&chunk[..n]);
                    if patterns.iter().any(|p| contains(&buf[from..], p)) {
                        break;
                    }
                }
                Ok(ReadEvent::Idle) => {}
                Ok(ReadEvent::Closed) => {
                    debug!("End of stream after {} bytes", buf.len());
                    break;
                }
                Err(e) => {
                    debug!("Read failed after {} bytes: {}", buf.len(), e);
                    break;
                }
            }
        }

        buf
    }

    /// Discard input until nothing has arrived for `quiet`.
    ///
    /// Every burst restarts the quiet timer. Returns the number of bytes
    /// discarded.
    pub fn drain<L>(&self, link: &mut L, quiet: Duration) -> usize
    where
        L: SerialLink + ?Sized,
    {
        let started = Instant::now();
        let mut last_byte = started;
        let mut discarded = 0;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let idle = last_byte.elapsed();
            if idle >= quiet {
                break;
            }
            if started.elapsed() >= self.drain_limit {
                debug!("Line still busy after {:?}, stopping drain", self.drain_limit);
                break;
            }
            let wait = (quiet - idle).min(self.slice);

            match link.poll_read(&mut chunk, wait) {
                Ok(ReadEvent::Data(n)) => {
                    discarded += n;
                    last_byte = Instant::now();
                }
                Ok(ReadEvent::Idle) => {}
                Ok(ReadEvent::Closed) | Err(_) => break,
            }
        }

        discarded
    }
}
