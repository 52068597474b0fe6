//! Console commands and keystrokes
//!
//! Everything written to the console ends with CR and a NUL byte; commands
//! add LF before the NUL. The NUL is padding the BMC shell ignores.

use std::fmt;
use wedgebmc_core::{BmcError, Result};

/// Terminator appended to every command line
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n\0";

/// The single keystroke used to refresh the prompt
pub const WAKEUP: &[u8] = b"\r\0";

/// Bytes for a line typed at a login or password prompt
pub fn keystrokes(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + WAKEUP.len());
    bytes.extend_from_slice(text.as_bytes());
    bytes.extend_from_slice(WAKEUP);
    bytes
}

/// Immutable shell command text, validated for verbatim transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmcCommand {
    text: String,
}

impl BmcCommand {
    /// Validate `text` as a single line of printable ASCII.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();

        if text.trim().is_empty() {
            return Err(BmcError::InvalidCommand("empty command".to_string()));
        }
        if let Some(c) = text.chars().find(|c| !c.is_ascii() || c.is_ascii_control()) {
            return Err(BmcError::InvalidCommand(format!(
                "unsupported character {:?} in {:?}",
                c, text
            )));
        }

        Ok(Self { text })
    }

    /// Text exactly as the shell will echo it
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Wire bytes: the text followed by CR LF NUL
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.text.len() + COMMAND_TERMINATOR.len());
        bytes.extend_from_slice(self.text.as_bytes());
        bytes.extend_from_slice(COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for BmcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `cat <path>`
pub fn cat(path: &str) -> String {
    format!("cat {}", path)
}

/// Register width for `i2cget`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cWidth {
    Byte,
    Word,
}

/// `i2cget -f -y BUS ADDR REG [w]`
pub fn i2cget(bus: u8, addr: u8, reg: u8, width: I2cWidth) -> String {
    match width {
        I2cWidth::Byte => format!("i2cget -f -y {} 0x{:02x} 0x{:02x}", bus, addr, reg),
        I2cWidth::Word => format!("i2cget -f -y {} 0x{:02x} 0x{:02x} w", bus, addr, reg),
    }
}

/// `i2cset -f -y BUS ADDR REG VALUE`
pub fn i2cset(bus: u8, addr: u8, reg: u8, value: u8) -> String {
    format!(
        "i2cset -f -y {} 0x{:02x} 0x{:02x} 0x{:02x}",
        bus, addr, reg, value
    )
}

/// `i2cset -f -y BUS ADDR VALUE`
///
/// Devices such as the PCA9546 mux take one configuration byte and no
/// register address.
pub fn i2cset_direct(bus: u8, addr: u8, value: u8) -> String {
    format!("i2cset -f -y {} 0x{:02x} 0x{:02x}", bus, addr, value)
}
