//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the client is constructed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{BmcError, Result};

/// Serial device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Path of the USB CDC device wired to the BMC console
    pub device: String,
    /// Line speed, applied to both directions
    pub baud_rate: u32,
    /// Log every byte written to and read from the console
    pub debug_uart: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            baud_rate: 57600,
            debug_uart: false,
        }
    }
}

/// Console login configuration
///
/// The markers are matched as raw substrings of the console output. The
/// prompt marker matches `root@HOSTNAME:~# ` for any hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Account used when the console shows a login banner
    pub username: String,
    /// Password for `username`
    pub password: String,
    /// Trailing shell prompt that means "ready for input"
    pub prompt: String,
    /// Banner substring that asks for a username
    pub login_marker: String,
    /// Substring that asks for the password
    pub password_marker: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            password: "0penBmc".to_string(),
            prompt: ":~# ".to_string(),
            login_marker: " login:".to_string(),
            password_marker: "Password:".to_string(),
        }
    }
}

/// Retry bounds and timeouts, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Attempts to open the device before giving up on one exchange attempt
    pub open_attempts: u32,
    /// Pause between open attempts
    pub open_retry_delay_ms: u64,
    /// Attempts to bring the console to an authenticated prompt
    pub login_attempts: u32,
    /// Wait for a prompt (or banner) after the wakeup keystroke
    pub prompt_wait_ms: u64,
    /// Wait for each of the password prompt and the post-login prompt
    pub login_step_wait_ms: u64,
    /// Pause between login attempts
    pub login_retry_pause_ms: u64,
    /// Full open/login/write/read cycles per command
    pub command_attempts: u32,
    /// Wait for the prompt after writing a command
    pub command_timeout_ms: u64,
    /// Quiet period that ends a drain
    pub drain_quiet_ms: u64,
    /// Upper bound of a single poll wait
    pub poll_slice_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            open_attempts: 20,
            open_retry_delay_ms: 100,
            login_attempts: 10,
            prompt_wait_ms: 1000,
            login_step_wait_ms: 2000,
            login_retry_pause_ms: 50,
            command_attempts: 10,
            command_timeout_ms: 5000,
            drain_quiet_ms: 50,
            poll_slice_ms: 50,
        }
    }
}

impl TimingConfig {
    pub fn open_retry_delay(&self) -> Duration {
        Duration::from_millis(self.open_retry_delay_ms)
    }

    pub fn prompt_wait(&self) -> Duration {
        Duration::from_millis(self.prompt_wait_ms)
    }

    pub fn login_step_wait(&self) -> Duration {
        Duration::from_millis(self.login_step_wait_ms)
    }

    pub fn login_retry_pause(&self) -> Duration {
        Duration::from_millis(self.login_retry_pause_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn drain_quiet(&self) -> Duration {
        Duration::from_millis(self.drain_quiet_ms)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }

    /// Worst-case duration of one `send`, ignoring time spent inside the
    /// open syscall itself.
    pub fn worst_case_send(&self) -> Duration {
        let open = self.open_retry_delay() * self.open_attempts;
        let login_attempt = self.prompt_wait() + self.login_step_wait() * 2 + self.login_retry_pause();
        let login = login_attempt * self.login_attempts;
        let attempt = open + login + self.drain_quiet() + self.command_timeout();
        attempt * self.command_attempts
    }
}

/// Telemetry cache lifetimes, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Fan tray presence and rotor readings
    pub fan_ttl_ms: u64,
    /// PSU PMBus snapshots
    pub psu_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fan_ttl_ms: 2000,
            psu_ttl_ms: 30_000,
        }
    }
}

impl CacheConfig {
    pub fn fan_ttl(&self) -> Duration {
        Duration::from_millis(self.fan_ttl_ms)
    }

    pub fn psu_ttl(&self) -> Duration {
        Duration::from_millis(self.psu_ttl_ms)
    }
}

/// Static configuration for the BMC console client.
///
/// Located at `~/.config/wedgebmc/config.toml` by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub serial: SerialConfig,
    pub login: LoginConfig,
    pub timing: TimingConfig,
    pub cache: CacheConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load and validate the configuration file at `path`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            BmcError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content).map_err(|e| {
            BmcError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every exchange fail or spin.
    pub fn validate(&self) -> Result<()> {
        if self.serial.device.is_empty() {
            return Err(BmcError::Config("serial.device must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(BmcError::Config("serial.baud_rate must be positive".into()));
        }
        if self.login.prompt.is_empty() {
            return Err(BmcError::Config("login.prompt must not be empty".into()));
        }
        let timing = &self.timing;
        for (name, value) in [
            ("open_attempts", timing.open_attempts),
            ("login_attempts", timing.login_attempts),
            ("command_attempts", timing.command_attempts),
        ] {
            if value == 0 {
                return Err(BmcError::Config(format!("timing.{} must be at least 1", name)));
            }
        }
        if timing.poll_slice_ms == 0 {
            return Err(BmcError::Config("timing.poll_slice_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.login.prompt, ":~# ");
        assert_eq!(config.timing.command_attempts, 10);
        assert_eq!(config.timing.open_attempts, 20);
        assert_eq!(config.cache.psu_ttl(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_static_config_serialization() {
        let config = StaticConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[login]"));
        assert!(toml_str.contains("[timing]"));
        assert!(toml_str.contains("[cache]"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let toml_str = r#"
            [serial]
            device = "/dev/ttyUSB1"

            [timing]
            command_attempts = 3
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.serial.device, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.timing.command_attempts, 3);
        assert_eq!(config.timing.login_attempts, 10);
        assert_eq!(config.login, LoginConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = StaticConfig::default();
        config.timing.login_attempts = 0;
        assert!(matches!(config.validate(), Err(BmcError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StaticConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StaticConfig::default());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial\nbroken").unwrap();

        let err = StaticConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, BmcError::Config(_)));
    }

    #[test]
    fn test_load_round_trip() {
        let mut config = StaticConfig::default();
        config.login.password = "secret".to_string();
        config.cache.fan_ttl_ms = 500;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", config.to_toml().unwrap()).unwrap();

        let loaded = StaticConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_worst_case_send_grows_with_attempts() {
        let mut timing = TimingConfig::default();
        let base = timing.worst_case_send();
        timing.command_attempts = 20;
        assert_eq!(timing.worst_case_send(), base * 2);
    }
}
