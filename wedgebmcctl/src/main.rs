//! Wedge 100S BMC console CLI
//!
//! Reads fan, thermal and PSU telemetry from the BMC over its serial
//! console, and runs raw shell and I2C commands.

use anyhow::Result;
use clap::Parser;
use wedgebmcctl::cli::{
    generate_completion, handle_config, handle_fans, handle_i2cget, handle_i2cset, handle_psus,
    handle_read, handle_send, handle_set_speed, handle_status, handle_thermals, open_channel,
    open_platform, Cli, Commands, OutputFormat,
};
use wedgebmcctl::config::CliConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completion scripts need no configuration or device
    if let Commands::Completion { shell } = cli.command {
        generate_completion(shell);
        return Ok(());
    }

    // Build configuration using priority chain: defaults → file → env → CLI args
    let mut builder = CliConfig::builder();
    if let Some(ref path) = cli.config {
        builder = builder.with_config_path(path);
    }
    if let Some(ref device) = cli.device {
        builder = builder.with_device(device)?;
    }
    if let Some(ref format) = cli.format {
        builder = builder.with_output_format(format.as_str())?;
    }
    if cli.verbose {
        builder = builder.with_verbose(true);
    }
    builder = builder.with_env_overrides();

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.verbose);

    let output_format = match config.output_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    let channel = open_channel(&config, cli.mock);
    let result = match cli.command {
        Commands::Status => handle_status(&open_platform(channel, &config), &output_format),
        Commands::Fans => handle_fans(&open_platform(channel, &config), &output_format),
        Commands::Thermals => handle_thermals(&open_platform(channel, &config), &output_format),
        Commands::Psus => handle_psus(&open_platform(channel, &config), &output_format),
        Commands::SetSpeed { percent } => handle_set_speed(&open_platform(channel, &config), percent),
        Commands::Send { command } => handle_send(channel.as_ref(), &command, &output_format),
        Commands::Read { path, hex } => handle_read(channel.as_ref(), &path, hex, &output_format),
        Commands::I2cGet {
            bus,
            addr,
            reg,
            word,
        } => handle_i2cget(channel.as_ref(), bus, addr, reg, word, &output_format),
        Commands::I2cSet {
            bus,
            addr,
            reg,
            value,
        } => handle_i2cset(channel.as_ref(), bus, addr, reg, value),
        Commands::Config { command } => handle_config(command, &config, &output_format),
        Commands::Completion { .. } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if config.verbose {
            eprintln!("Error details: {:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Log to stderr so table and JSON output stay clean on stdout
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
