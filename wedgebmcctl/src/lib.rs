//! Wedge BMC CLI Library
//!
//! Command definitions, handlers and output formatting for `wedgebmcctl`.
//! Configuration types are available via [`config::CliConfig`] and
//! [`config::ConfigBuilder`].
//!
//! ```no_run
//! use wedgebmcctl::cli::{open_channel, open_platform};
//! use wedgebmcctl::config::CliConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = CliConfig::builder().with_env_overrides().build()?;
//! let platform = open_platform(open_channel(&config, false), &config);
//! for fan in platform.fans().statuses()? {
//!     println!("{}: {:?} rpm", fan.name, fan.rpm);
//! }
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// Configuration types for the CLI tool.
pub mod config;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;
