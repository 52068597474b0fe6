//! Command execution handlers

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tracing::debug;
use wedgebmc_hardware::{BmcClient, MockBmc, Platform, ShellChannel};

use crate::config::CliConfig;
use crate::format::{
    format_fans, format_psus, format_snapshot, format_success, format_thermals, format_transcript,
    format_value,
};

use super::commands::*;

/// Open the command channel described by `config`
///
/// With `mock` set the channel talks to a simulated Wedge 100S console
/// instead of the serial device; everything above the tty is the same.
pub fn open_channel(config: &CliConfig, mock: bool) -> Arc<dyn ShellChannel> {
    if mock {
        debug!("Using simulated BMC console");
        Arc::new(BmcClient::with_opener(
            MockBmc::wedge100s(),
            config.bmc.login.clone(),
            config.bmc.timing.clone(),
        ))
    } else {
        debug!("Using BMC console on {}", config.bmc.serial.device);
        Arc::new(BmcClient::from_config(&config.bmc))
    }
}

/// Build the telemetry façade over an open channel
pub fn open_platform(channel: Arc<dyn ShellChannel>, config: &CliConfig) -> Platform {
    Platform::new(channel, &config.bmc.cache)
}

/// Handle status command
pub fn handle_status(platform: &Platform, format: &OutputFormat) -> Result<()> {
    let snapshot = platform.snapshot()?;
    println!("{}", format_snapshot(&snapshot, &format.into())?);
    Ok(())
}

/// Handle fans command
pub fn handle_fans(platform: &Platform, format: &OutputFormat) -> Result<()> {
    let fans = platform.fans().statuses()?;
    println!("{}", format_fans(&fans, &format.into())?);
    Ok(())
}

/// Handle thermals command
pub fn handle_thermals(platform: &Platform, format: &OutputFormat) -> Result<()> {
    let thermals = platform.thermals().statuses()?;
    println!("{}", format_thermals(&thermals, &format.into())?);
    Ok(())
}

/// Handle psus command
pub fn handle_psus(platform: &Platform, format: &OutputFormat) -> Result<()> {
    let psus = platform.psus().statuses()?;
    println!("{}", format_psus(&psus, &format.into())?);
    Ok(())
}

/// Handle set-speed command
pub fn handle_set_speed(platform: &Platform, percent: u32) -> Result<()> {
    if !platform.fans().set_speed(percent) {
        bail!("BMC did not complete the fan speed change");
    }
    let applied = platform.fans().target_speed().unwrap_or(0);
    println!(
        "{}",
        format_success(&format!("Fan trays set to {}% duty", applied))
    );
    Ok(())
}

/// Handle send command
pub fn handle_send(channel: &dyn ShellChannel, words: &[String], format: &OutputFormat) -> Result<()> {
    let line = words.join(" ");
    let transcript = channel
        .send(&line)
        .ok_or_else(|| anyhow!("No complete response from BMC for '{}'", line))?;
    println!("{}", format_transcript(&line, &transcript, &format.into())?);
    Ok(())
}

/// Handle read command
pub fn handle_read(
    channel: &dyn ShellChannel,
    path: &str,
    hex: bool,
    format: &OutputFormat,
) -> Result<()> {
    let base = if hex { 16 } else { 10 };
    let value = channel
        .file_read_int(path, base)
        .ok_or_else(|| anyhow!("Could not read an integer from {}", path))?;
    println!("{}", format_value(path, value, hex, &format.into())?);
    Ok(())
}

/// Handle i2cget command
pub fn handle_i2cget(
    channel: &dyn ShellChannel,
    bus: u8,
    addr: u8,
    reg: u8,
    word: bool,
    format: &OutputFormat,
) -> Result<()> {
    let value = if word {
        channel.i2cget_word(bus, addr, reg).map(i64::from)
    } else {
        channel.i2cget_byte(bus, addr, reg).map(i64::from)
    };
    let label = format!("i2c-{} 0x{:02x} reg 0x{:02x}", bus, addr, reg);
    let value = value.ok_or_else(|| anyhow!("No value read from {}", label))?;
    println!("{}", format_value(&label, value, true, &format.into())?);
    Ok(())
}

/// Handle i2cset command
pub fn handle_i2cset(channel: &dyn ShellChannel, bus: u8, addr: u8, reg: u8, value: u8) -> Result<()> {
    if !channel.i2cset_byte(bus, addr, reg, value) {
        bail!(
            "Write of 0x{:02x} to i2c-{} 0x{:02x} reg 0x{:02x} did not complete",
            value,
            bus,
            addr,
            reg
        );
    }
    println!(
        "{}",
        format_success(&format!(
            "Wrote 0x{:02x} to i2c-{} 0x{:02x} reg 0x{:02x}",
            value, bus, addr, reg
        ))
    );
    Ok(())
}

/// Handle config commands
pub fn handle_config(command: ConfigCommands, config: &CliConfig, format: &OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let mut shown = config.bmc.clone();
            shown.login.password = "********".to_string();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
                OutputFormat::Table => {
                    println!("# {}", config.config_path.display());
                    print!("{}", shown.to_toml()?);
                }
            }
        }
        ConfigCommands::Path => println!("{}", config.config_path.display()),
    }
    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
