//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use serde::Serialize;
use wedgebmc_core::{FanStatus, PsuStatus, ThermalStatus};
use wedgebmc_hardware::PlatformSnapshot;

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
}

const UNAVAILABLE: &str = "N/A";

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.2} {}", v, unit),
        None => UNAVAILABLE.dimmed().to_string(),
    }
}

fn health(ok: bool) -> String {
    if ok {
        "OK".green().to_string()
    } else {
        "NOT OK".red().to_string()
    }
}

/// Format fan tray status
pub fn format_fans(fans: &[FanStatus], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(fans),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct FanRow {
                #[tabled(rename = "Tray")]
                name: String,
                #[tabled(rename = "Present")]
                present: String,
                #[tabled(rename = "Front RPM")]
                front: String,
                #[tabled(rename = "Rear RPM")]
                rear: String,
                #[tabled(rename = "Speed %")]
                speed: String,
                #[tabled(rename = "Target %")]
                target: String,
                #[tabled(rename = "Status")]
                status: String,
            }

            let rpm = |v: Option<u32>| match v {
                Some(0) => "0".red().to_string(),
                Some(rpm) => rpm.to_string(),
                None => UNAVAILABLE.dimmed().to_string(),
            };

            let rows: Vec<FanRow> = fans
                .iter()
                .map(|fan| FanRow {
                    name: fan.name.clone(),
                    present: if fan.present {
                        "Yes".green().to_string()
                    } else {
                        "No".red().to_string()
                    },
                    front: rpm(fan.rotors.front),
                    rear: rpm(fan.rotors.rear),
                    speed: format!("{}%", fan.speed_percent).cyan().to_string(),
                    target: fan
                        .target_percent
                        .map(|t| format!("{}%", t))
                        .unwrap_or_else(|| UNAVAILABLE.dimmed().to_string()),
                    status: health(fan.ok),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", "Fan Trays:".bold(), table))
        }
    }
}

/// Format thermal sensor status
pub fn format_thermals(thermals: &[ThermalStatus], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(thermals),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct ThermalRow {
                #[tabled(rename = "Sensor")]
                name: String,
                #[tabled(rename = "Temperature")]
                temperature: String,
                #[tabled(rename = "High")]
                high: String,
                #[tabled(rename = "Critical")]
                critical: String,
            }

            let rows: Vec<ThermalRow> = thermals
                .iter()
                .map(|t| {
                    let temperature = match t.temperature {
                        Some(c) if c >= t.high_critical_threshold => {
                            format!("{:.2} °C", c).red().bold().to_string()
                        }
                        Some(c) if c >= t.high_threshold => {
                            format!("{:.2} °C", c).yellow().to_string()
                        }
                        Some(c) => format!("{:.2} °C", c).green().to_string(),
                        None => UNAVAILABLE.dimmed().to_string(),
                    };
                    ThermalRow {
                        name: t.name.clone(),
                        temperature,
                        high: format!("{:.1} °C", t.high_threshold),
                        critical: format!("{:.1} °C", t.high_critical_threshold),
                    }
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", "Thermal Sensors:".bold(), table))
        }
    }
}

/// Format PSU telemetry
pub fn format_psus(psus: &[PsuStatus], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(psus),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct PsuRow {
                #[tabled(rename = "PSU")]
                name: String,
                #[tabled(rename = "Vin")]
                vin: String,
                #[tabled(rename = "Iin")]
                iin: String,
                #[tabled(rename = "Vout")]
                vout: String,
                #[tabled(rename = "Iout")]
                iout: String,
                #[tabled(rename = "Pout")]
                pout: String,
                #[tabled(rename = "Capacity")]
                capacity: String,
            }

            let rows: Vec<PsuRow> = psus
                .iter()
                .map(|p| PsuRow {
                    name: p.name.clone(),
                    vin: reading(p.telemetry.input_voltage, "V"),
                    iin: reading(p.telemetry.input_current, "A"),
                    vout: reading(p.telemetry.output_voltage, "V"),
                    iout: reading(p.telemetry.output_current, "A"),
                    pout: reading(p.telemetry.output_power, "W"),
                    capacity: format!("{:.0} W", p.capacity_watts),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", "Power Supplies:".bold(), table))
        }
    }
}

/// Format the full platform view
pub fn format_snapshot(snapshot: &PlatformSnapshot, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(snapshot),
        OutputFormat::Table => Ok(format!(
            "{}\n\n{}\n\n{}\n\n{}",
            snapshot.board.bold().cyan(),
            format_fans(&snapshot.fans, format)?,
            format_thermals(&snapshot.thermals, format)?,
            format_psus(&snapshot.psus, format)?
        )),
    }
}

/// Format a single value read from the BMC
pub fn format_value(label: &str, value: i64, hex: bool, format: &OutputFormat) -> Result<String> {
    let rendered = if hex {
        format!("0x{:x}", value)
    } else {
        value.to_string()
    };
    match format {
        OutputFormat::Json => json(&serde_json::json!({ "source": label, "value": value })),
        OutputFormat::Table => Ok(format!("{}: {}", label, rendered.cyan())),
    }
}

/// Format a raw shell transcript
pub fn format_transcript(command: &str, transcript: &str, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(&serde_json::json!({
            "command": command,
            "transcript": transcript,
        })),
        OutputFormat::Table => Ok(transcript.replace('\r', "")),
    }
}

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wedgebmc_core::{FanDirection, PsuTelemetry, RotorPair};

    fn fan() -> FanStatus {
        FanStatus {
            tray: 1,
            name: "FanTray 1".to_string(),
            present: true,
            rotors: RotorPair {
                front: Some(7500),
                rear: Some(4950),
            },
            rpm: Some(4950),
            speed_percent: 32,
            target_percent: None,
            direction: FanDirection::Intake,
            ok: true,
        }
    }

    fn psu() -> PsuStatus {
        PsuStatus {
            psu: 2,
            name: "PSU-2".to_string(),
            capacity_watts: 650.0,
            telemetry: PsuTelemetry {
                input_voltage: Some(230.0),
                output_power: Some(120.0),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_format_success() {
        let message = format_success("Operation completed");
        assert!(message.contains("✓"));
        assert!(message.contains("Operation completed"));
    }

    #[test]
    fn test_format_fans_json() {
        let result = format_fans(&[fan()], &OutputFormat::Json).unwrap();
        assert!(result.contains("\"tray\": 1"));
        assert!(result.contains("4950"));
        assert!(result.contains("\"intake\""));
        assert!(result.contains("\"target_percent\": null"));
    }

    #[test]
    fn test_format_fans_table() {
        let result = format_fans(&[fan()], &OutputFormat::Table).unwrap();
        assert!(result.contains("FanTray 1"));
        assert!(result.contains("7500"));
        assert!(result.contains("Front RPM"));
    }

    #[test]
    fn test_format_psus_flattens_telemetry() {
        let result = format_psus(&[psu()], &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(value[0]["input_voltage"], 230.0);
        assert!(value[0]["output_current"].is_null());

        let table = format_psus(&[psu()], &OutputFormat::Table).unwrap();
        assert!(table.contains("230.00 V"));
        assert!(table.contains("650 W"));
        assert!(table.contains(UNAVAILABLE));
    }

    #[test]
    fn test_format_thermals() {
        let status = ThermalStatus {
            index: 0,
            name: "TMP75-1".to_string(),
            temperature: Some(23.75),
            high_threshold: 70.0,
            high_critical_threshold: 80.0,
            minimum_recorded: Some(23.75),
            maximum_recorded: Some(23.75),
        };

        let table = format_thermals(&[status.clone()], &OutputFormat::Table).unwrap();
        assert!(table.contains("TMP75-1"));
        assert!(table.contains("23.75"));

        let json = format_thermals(&[status], &OutputFormat::Json).unwrap();
        assert!(json.contains("\"high_critical_threshold\": 80.0"));
    }

    #[test]
    fn test_format_value() {
        let table = format_value("fantray_present", 0x14, true, &OutputFormat::Table).unwrap();
        assert!(table.contains("0x14"));

        let json = format_value("temp", 23750, false, &OutputFormat::Json).unwrap();
        assert!(json.contains("23750"));
    }

    #[test]
    fn test_format_transcript_strips_carriage_returns() {
        let out = format_transcript("uptime", "uptime\r\n up 3 days\r\n", &OutputFormat::Table)
            .unwrap();
        assert_eq!(out, "uptime\n up 3 days\n");
    }
}
