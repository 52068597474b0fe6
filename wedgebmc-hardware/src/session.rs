//! Device session
//!
//! A [`Session`] owns one open console link for the duration of a single
//! exchange. Dropping it releases the device, so every exit path of a caller
//! (return, `?`, panic) closes the link exactly once.

use std::io;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wedgebmc_core::{BmcError, Result, TimingConfig};

use crate::serial_driver::{LinkOpener, ReadEvent, SerialLink};

/// Exclusively-owned handle to the console, valid between open and close
pub struct Session<L: SerialLink> {
    link: Option<L>,
    device: String,
}

impl<L: SerialLink> Session<L> {
    /// Open the device, retrying transient failures.
    ///
    /// Up to `timing.open_attempts` attempts are made, `timing.open_retry_delay`
    /// apart, to ride out a device that is busy or still re-enumerating.
    pub fn open<O>(opener: &O, timing: &TimingConfig) -> Result<Self>
    where
        O: LinkOpener<Link = L> + ?Sized,
    {
        let attempts = timing.open_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match opener.open_link() {
                Ok(link) => {
                    if attempt > 1 {
                        debug!("Opened {} on attempt {}", opener.device(), attempt);
                    }
                    return Ok(Self {
                        link: Some(link),
                        device: opener.device().to_string(),
                    });
                }
                Err(e) => {
                    debug!(
                        "Open attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        opener.device(),
                        e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(timing.open_retry_delay());
                    }
                }
            }
        }

        warn!(
            "Giving up on {} after {} open attempts",
            opener.device(),
            attempts
        );
        Err(BmcError::DeviceUnavailable {
            device: opener.device().to_string(),
            attempts,
            reason: last_error,
        })
    }

    /// Release the device. Safe to call more than once.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!("Closed session on {}", self.device);
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn link_mut(&mut self) -> io::Result<&mut L> {
        self.link
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session closed"))
    }
}

impl<L: SerialLink> SerialLink for Session<L> {
    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadEvent> {
        self.link_mut()?.poll_read(buf, wait)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.link_mut()?.write_all(data)
    }
}

impl<L: SerialLink> Drop for Session<L> {
    fn drop(&mut self) {
        self.close();
    }
}
