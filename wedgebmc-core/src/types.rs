//! Core telemetry types for wedgebmc

use serde::{Deserialize, Serialize};

/// Airflow direction of a fan tray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanDirection {
    /// Front-to-back
    Intake,
    /// Back-to-front
    Exhaust,
}

/// Front and rear rotor speeds of one fan tray
///
/// Either side is `None` when its sysfs read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotorPair {
    pub front: Option<u32>,
    pub rear: Option<u32>,
}

impl RotorPair {
    /// Slowest readable rotor, so a single stalled rotor shows as 0
    pub fn min_rpm(&self) -> Option<u32> {
        match (self.front, self.rear) {
            (Some(front), Some(rear)) => Some(front.min(rear)),
            (Some(rpm), None) | (None, Some(rpm)) => Some(rpm),
            (None, None) => None,
        }
    }
}

/// Point-in-time view of one fan tray
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanStatus {
    /// 1-based tray index
    pub tray: u8,
    pub name: String,
    pub present: bool,
    pub rotors: RotorPair,
    /// Slowest rotor RPM
    pub rpm: Option<u32>,
    /// Speed as a percentage of the board's maximum RPM
    pub speed_percent: u8,
    /// Last duty cycle successfully applied, if any
    pub target_percent: Option<u8>,
    pub direction: FanDirection,
    /// Present with at least one rotor turning
    pub ok: bool,
}

/// Point-in-time view of one thermal sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStatus {
    /// 0-based sensor index
    pub index: usize,
    pub name: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    pub high_threshold: f64,
    pub high_critical_threshold: f64,
    pub minimum_recorded: Option<f64>,
    pub maximum_recorded: Option<f64>,
}

/// PMBus readings of one PSU, in V / A / W
///
/// Fields are `None` when the corresponding register could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PsuTelemetry {
    pub input_voltage: Option<f64>,
    pub input_current: Option<f64>,
    pub output_current: Option<f64>,
    pub output_power: Option<f64>,
    /// Derived as output power / output current
    pub output_voltage: Option<f64>,
}

impl PsuTelemetry {
    /// True when no register could be read
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Point-in-time view of one PSU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsuStatus {
    /// 1-based PSU index
    pub psu: u8,
    pub name: String,
    pub capacity_watts: f64,
    #[serde(flatten)]
    pub telemetry: PsuTelemetry,
}
