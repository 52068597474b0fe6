//! wedgebmc Core Library
//!
//! Shared types, board constants, and configuration for the Wedge 100S BMC
//! console client. Nothing in this crate performs I/O on the console.

pub mod board;
pub mod config;
pub mod error;
pub mod pmbus;
pub mod types;

// Re-export commonly used types
pub use board::*;
pub use config::{
    default_config_path, CacheConfig, LoginConfig, SerialConfig, StaticConfig, TimingConfig,
};
pub use error::*;
pub use types::*;
