//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wedge 100S BMC console CLI
#[derive(Parser, Debug)]
#[command(name = "wedgebmcctl")]
#[command(version, about = "Wedge 100S BMC console CLI", long_about = None)]
pub struct Cli {
    /// Config file path (default: ~/.config/wedgebmc/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serial device wired to the BMC console (overrides config file)
    #[arg(short, long, global = true)]
    pub device: Option<String>,

    /// Output format (overrides config file)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Talk to a simulated BMC instead of the serial device
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        }
    }
}

impl From<&OutputFormat> for crate::format::OutputFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show fans, thermal sensors and PSUs
    Status,

    /// Show fan tray status
    Fans,

    /// Show thermal sensor readings
    Thermals,

    /// Show PSU telemetry
    Psus,

    /// Set every fan tray to a duty cycle
    SetSpeed {
        /// Duty cycle in percent (values above 100 are clamped)
        percent: u32,
    },

    /// Run a shell command on the BMC and print the transcript
    Send {
        /// Command line, sent verbatim
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Read an integer from a file on the BMC
    Read {
        /// File path on the BMC (shell wildcards allowed)
        path: String,

        /// Parse the file as hexadecimal
        #[arg(long)]
        hex: bool,
    },

    /// Read a register over a BMC I2C bus
    #[command(name = "i2cget")]
    I2cGet {
        /// Bus number
        bus: u8,

        /// Device address (e.g. 0x5a)
        #[arg(value_parser = parse_byte)]
        addr: u8,

        /// Register (e.g. 0x88)
        #[arg(value_parser = parse_byte)]
        reg: u8,

        /// Read a 16-bit word instead of a byte
        #[arg(short, long)]
        word: bool,
    },

    /// Write a register byte over a BMC I2C bus
    #[command(name = "i2cset")]
    I2cSet {
        /// Bus number
        bus: u8,

        /// Device address (e.g. 0x32)
        #[arg(value_parser = parse_byte)]
        addr: u8,

        /// Register (e.g. 0x10)
        #[arg(value_parser = parse_byte)]
        reg: u8,

        /// Value to write
        #[arg(value_parser = parse_byte)]
        value: u8,
    },

    /// Show CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the config file path
    Path,
}

/// Parse a byte given in hex (`0x5a`) or decimal (`90`)
pub fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| format!("'{}' is not a byte (0-255 or 0x00-0xff)", s))
}
