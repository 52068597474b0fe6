//! Configuration types for wedgebmc
//!
//! # Architecture
//!
//! Everything lives in one [`StaticConfig`] loaded once at startup:
//! - `[serial]` - device path and line speed
//! - `[login]` - console credentials and the prompt substrings
//! - `[timing]` - retry bounds and per-step timeouts
//! - `[cache]` - telemetry cache lifetimes
//!
//! Every field has a default, so a partial file only overrides what it names.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{CacheConfig, LoginConfig, SerialConfig, StaticConfig, TimingConfig};
