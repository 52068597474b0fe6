//! Serial driver for the BMC console
//!
//! Provides blocking, poll-bounded byte I/O on the USB CDC device wired to
//! the BMC's serial console.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, error};
use wedgebmc_core::{BmcError, Result, SerialConfig};

/// Outcome of one bounded read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// This many bytes were stored at the front of the buffer
    Data(usize),
    /// Nothing arrived within the wait
    Idle,
    /// The device reported end of stream
    Closed,
}

/// Byte-level access to an open console
///
/// This trait lets the session, reader and login layers run against
/// simulated consoles as well as real hardware.
pub trait SerialLink: Send {
    /// Wait up to `wait` for input, then read whatever is available.
    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadEvent>;

    /// Write every byte and flush.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Acquires fresh console links
///
/// Each call to `open_link` must return an independent link; stale handles
/// are never reused across exchanges.
pub trait LinkOpener: Send + Sync {
    type Link: SerialLink;

    /// Open the device once, without retrying.
    fn open_link(&self) -> Result<Self::Link>;

    /// Device name used in logs and errors
    fn device(&self) -> &str;
}

/// Opens the real console device
///
/// The `serialport` backend applies the line discipline the USB CDC adapter
/// needs: raw mode (no echo, no signals, no output processing), receiver on
/// and modem lines ignored, 8N1 without flow control at the configured speed
/// in both directions, parity errors ignored. It clears `O_NONBLOCK` after
/// configuring the port, so reads block until at least one byte arrives
/// (VMIN=1, VTIME=0) and `poll()` bounds every wait. ttyACM does not report
/// readiness reliably in non-blocking mode.
#[derive(Debug, Clone)]
pub struct SerialDriver {
    config: SerialConfig,
}

impl SerialDriver {
    /// Create a driver for the device named in `config`
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl LinkOpener for SerialDriver {
    type Link = TtyLink;

    fn open_link(&self) -> Result<TtyLink> {
        let port = serialport::new(&self.config.device, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", self.config.device, e);
                BmcError::Serial(format!("Failed to open {}: {}", self.config.device, e))
            })?;

        debug!(
            "Opened {} at {} baud",
            self.config.device, self.config.baud_rate
        );

        Ok(TtyLink {
            port,
            debug_uart: self.config.debug_uart,
        })
    }

    fn device(&self) -> &str {
        &self.config.device
    }
}

/// An open console device
///
/// The file descriptor is closed when the link is dropped.
pub struct TtyLink {
    port: Box<dyn SerialPort>,
    debug_uart: bool,
}

impl SerialLink for TtyLink {
    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadEvent> {
        self.port.set_timeout(wait).map_err(io::Error::from)?;

        match self.port.read(buf) {
            Ok(0) => Ok(ReadEvent::Closed),
            Ok(n) => {
                if self.debug_uart {
                    debug!("RX: {}", escape(&buf[..n]));
                }
                Ok(ReadEvent::Data(n))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                Ok(ReadEvent::Idle)
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.debug_uart {
            debug!("TX: {}", escape(data));
        }
        self.port.write_all(data)?;
        self.port.flush()
    }
}

/// Render console bytes for logs, escaping control characters
pub fn escape(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect()
}
