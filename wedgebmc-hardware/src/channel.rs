//! Command channel
//!
//! The only public entry point for talking to the BMC shell. Each `send`
//! runs complete exchanges (open, login, drain, write, read to prompt,
//! close) under one lock, so callers on different threads never see each
//! other's bytes.

use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use wedgebmc_core::{BmcError, LoginConfig, Result, StaticConfig, TimingConfig};

use crate::command::{self, BmcCommand, I2cWidth};
use crate::decoder::{extract_int, latin1};
use crate::login::LoginAutomator;
use crate::reader::{contains, StreamReader};
use crate::serial_driver::{LinkOpener, SerialDriver, SerialLink};
use crate::session::Session;

/// Something that can run a shell command on the BMC and return its
/// transcript
///
/// `send` returns `None` when no complete response could be obtained. The
/// typed accessors are built on `send` and absorb every failure the same way.
pub trait ShellChannel: Send + Sync {
    /// Run `command` and return the full transcript, or `None`.
    fn send(&self, command: &str) -> Option<String>;

    /// Read a file on the BMC and parse its first integer in `base`.
    fn file_read_int(&self, path: &str, base: u32) -> Option<i64> {
        let cmd = command::cat(path);
        let transcript = self.send(&cmd)?;
        extract_int(&transcript, &cmd, base)
    }

    /// Read one register byte over a BMC I2C bus.
    fn i2cget_byte(&self, bus: u8, addr: u8, reg: u8) -> Option<u8> {
        let cmd = command::i2cget(bus, addr, reg, I2cWidth::Byte);
        let transcript = self.send(&cmd)?;
        extract_int(&transcript, &cmd, 16).and_then(|v| u8::try_from(v).ok())
    }

    /// Read one register word over a BMC I2C bus.
    fn i2cget_word(&self, bus: u8, addr: u8, reg: u8) -> Option<u16> {
        let cmd = command::i2cget(bus, addr, reg, I2cWidth::Word);
        let transcript = self.send(&cmd)?;
        extract_int(&transcript, &cmd, 16).and_then(|v| u16::try_from(v).ok())
    }

    /// Write one register byte. Any complete transcript counts as success.
    fn i2cset_byte(&self, bus: u8, addr: u8, reg: u8, value: u8) -> bool {
        self.send(&command::i2cset(bus, addr, reg, value)).is_some()
    }

    /// Write a single byte to a device without a register address.
    fn i2cset_direct(&self, bus: u8, addr: u8, value: u8) -> bool {
        self.send(&command::i2cset_direct(bus, addr, value)).is_some()
    }
}

/// Serial console client for the BMC shell
///
/// Generic over the link opener so tests can substitute a simulated
/// console; the default is the real tty.
pub struct BmcClient<O: LinkOpener = SerialDriver> {
    opener: O,
    login: LoginConfig,
    timing: TimingConfig,
    reader: StreamReader,
    lock: Mutex<()>,
}

impl BmcClient<SerialDriver> {
    /// Create a client for the real console described by `config`
    pub fn from_config(config: &StaticConfig) -> Self {
        Self::with_opener(
            SerialDriver::new(config.serial.clone()),
            config.login.clone(),
            config.timing.clone(),
        )
    }
}

impl<O: LinkOpener> BmcClient<O> {
    /// Create a client over any link opener
    ///
    /// This is primarily useful for testing with simulated consoles.
    pub fn with_opener(opener: O, login: LoginConfig, timing: TimingConfig) -> Self {
        let reader = StreamReader::new(timing.poll_slice(), timing.command_timeout());
        Self {
            opener,
            login,
            timing,
            reader,
            lock: Mutex::new(()),
        }
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Run `command`, reporting why the last attempt failed.
    ///
    /// Same retry policy as [`ShellChannel::send`].
    pub fn try_send(&self, command: &str) -> Result<String> {
        let command = BmcCommand::new(command)?;

        // A panic in another exchange leaves nothing to repair; the session
        // it held was closed on unwind.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let attempts = self.timing.command_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.exchange(&command) {
                Ok(transcript) => {
                    if attempt > 1 {
                        debug!("'{}' succeeded on attempt {}", command, attempt);
                    }
                    return Ok(transcript);
                }
                Err(e) => {
                    debug!(
                        "Attempt {}/{} for '{}' failed: {}",
                        attempt, attempts, command, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BmcError::Timeout(format!("no attempt made for '{}'", command))))
    }

    /// One open/login/drain/write/read/close cycle
    fn exchange(&self, command: &BmcCommand) -> Result<String> {
        let mut session = Session::open(&self.opener, &self.timing)?;

        let automator = LoginAutomator::new(&self.login, &self.timing, &self.reader);
        if !automator.authenticate(&mut session) {
            return Err(BmcError::LoginFailed {
                attempts: self.timing.login_attempts,
            });
        }

        let stale = self.reader.drain(&mut session, self.timing.drain_quiet());
        if stale > 0 {
            debug!("Discarded {} stale bytes before '{}'", stale, command);
        }

        session.write_all(&command.to_bytes())?;

        let prompt = self.login.prompt.as_bytes();
        let buf = self
            .reader
            .read_until(&mut session, prompt, self.timing.command_timeout());
        session.close();

        if !contains(&buf, prompt) {
            return Err(BmcError::Timeout(format!(
                "no prompt after '{}' within {:?} ({} bytes read)",
                command,
                self.timing.command_timeout(),
                buf.len()
            )));
        }

        Ok(latin1(&buf))
    }
}

impl<O: LinkOpener> ShellChannel for BmcClient<O> {
    fn send(&self, command: &str) -> Option<String> {
        match self.try_send(command) {
            Ok(transcript) => Some(transcript),
            Err(BmcError::InvalidCommand(reason)) => {
                warn!("Refusing to send command: {}", reason);
                None
            }
            Err(e) => {
                warn!(
                    "'{}' failed after {} attempts: {}",
                    command, self.timing.command_attempts, e
                );
                None
            }
        }
    }
}
