//! CLI configuration management
//!
//! The console settings come from the shared `StaticConfig` file; the CLI
//! adds its output preferences on top.

use anyhow::{Context, Result};
use std::path::PathBuf;
use wedgebmc_core::{default_config_path, StaticConfig};

/// Effective configuration for one CLI run
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// File the console settings were loaded from (it may not exist)
    pub config_path: PathBuf,

    /// Console settings
    pub bmc: StaticConfig,

    /// Output format: `table` or `json`
    pub output_format: String,

    /// Enable debug logging
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            bmc: StaticConfig::default(),
            output_format: "table".to_string(),
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Create a new builder for constructing configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for CLI configuration with validation and priority chain support
///
/// Priority chain (lowest to highest):
/// 1. Defaults
/// 2. Config file
/// 3. Environment variables (`WEDGEBMC_DEVICE`, `WEDGEBMC_FORMAT`, `WEDGEBMC_VERBOSE`)
/// 4. CLI arguments
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    device: Option<String>,
    output_format: Option<String>,
    verbose: Option<bool>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the console settings from `path` instead of the default location
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set the serial device (with validation)
    pub fn with_device(mut self, device: impl Into<String>) -> Result<Self> {
        let device = device.into();
        Self::validate_device(&device)?;
        self.device = Some(device);
        Ok(self)
    }

    /// Set output format (with validation)
    pub fn with_output_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        Self::validate_output_format(&format)?;
        self.output_format = Some(format);
        Ok(self)
    }

    /// Set verbose flag
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Values already set are kept, and invalid values are ignored.
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.device.is_none() {
            if let Some(device) = lookup("WEDGEBMC_DEVICE") {
                if Self::validate_device(&device).is_ok() {
                    self.device = Some(device);
                }
            }
        }

        if self.output_format.is_none() {
            if let Some(format) = lookup("WEDGEBMC_FORMAT") {
                if Self::validate_output_format(&format).is_ok() {
                    self.output_format = Some(format);
                }
            }
        }

        if self.verbose.is_none() {
            if let Some(verbose) = lookup("WEDGEBMC_VERBOSE") {
                self.verbose = Some(verbose.to_lowercase() == "true" || verbose == "1");
            }
        }

        self
    }

    /// Load the config file and apply overrides on top of it
    pub fn build(self) -> Result<CliConfig> {
        let defaults = CliConfig::default();
        let config_path = self.config_path.unwrap_or(defaults.config_path);

        let mut bmc = StaticConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        if let Some(device) = self.device {
            bmc.serial.device = device;
        }
        bmc.validate().context("Invalid console settings")?;

        let output_format = self.output_format.unwrap_or(defaults.output_format);
        Self::validate_output_format(&output_format)?;

        Ok(CliConfig {
            config_path,
            bmc,
            output_format,
            verbose: self.verbose.unwrap_or(defaults.verbose),
        })
    }

    /// Validate a device path
    fn validate_device(device: &str) -> Result<()> {
        if device.trim().is_empty() {
            return Err(anyhow::anyhow!("Serial device cannot be empty"));
        }
        Ok(())
    }

    /// Validate output format
    fn validate_output_format(format: &str) -> Result<()> {
        match format {
            "table" | "json" => Ok(()),
            _ => Err(anyhow::anyhow!(
                "Invalid output format '{}'. Must be 'table' or 'json'",
                format
            )),
        }
    }
}
