//! Error types for the wedgebmc system

use thiserror::Error;

/// Core error type for BMC console operations
#[derive(Error, Debug)]
pub enum BmcError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Device could not be opened within the retry bound
    #[error("Device {device} unavailable after {attempts} attempts: {reason}")]
    DeviceUnavailable {
        device: String,
        attempts: u32,
        reason: String,
    },

    /// Remote shell never reached an authenticated prompt
    #[error("Login failed after {attempts} attempts")]
    LoginFailed { attempts: u32 },

    /// Command text cannot be sent verbatim to the remote shell
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type alias for BMC operations
pub type Result<T> = std::result::Result<T, BmcError>;

impl From<toml::de::Error> for BmcError {
    fn from(err: toml::de::Error) -> Self {
        BmcError::Config(err.to_string())
    }
}
