//! Board definitions
//!
//! This module describes where each piece of BMC-side telemetry lives on a
//! given switch model. Each model implements the `BoardConfig` trait with its
//! sysfs paths, I2C addresses and fan limits.
//!
//! Note: Actual console I/O is in the `wedgebmc-hardware` crate. This module only
//! contains board specifications and type definitions.

use std::marker::PhantomData;

/// A TMP75 (or compatible) sensor exposed through BMC sysfs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalSensorSpec {
    /// Human-readable sensor name
    pub name: &'static str,
    /// BMC sysfs path to the millidegree reading; may contain a shell wildcard
    pub path: &'static str,
    /// Default high threshold in °C
    pub high_threshold: f64,
    /// Default high critical threshold in °C
    pub high_critical_threshold: f64,
}

/// How a PSU's PMBus endpoint is reached from the BMC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsuChannel {
    /// Byte written to the mux to select this PSU's segment
    pub mux_channel: u8,
    /// PMBus device address behind the mux
    pub pmbus_addr: u8,
}

/// Hardware board configuration trait
///
/// # Example
///
/// ```
/// use wedgebmc_core::board::{BoardConfig, Wedge100s32x};
///
/// const TRAYS: u8 = Wedge100s32x::FAN_TRAY_COUNT;
/// assert_eq!(TRAYS, 5);
/// ```
pub trait BoardConfig: Send + Sync + 'static {
    /// Human-readable board name
    const NAME: &'static str;

    /// Number of fan trays (each tray has a front and a rear rotor)
    const FAN_TRAY_COUNT: u8;

    /// Rotor RPM at 100% duty cycle
    const MAX_FAN_RPM: u32;

    /// Allowed deviation from the target speed, in percentage points
    const FAN_SPEED_TOLERANCE: u8;

    /// BMC sysfs directory of the fan-board controller (with trailing slash)
    const FAN_BOARD_PATH: &'static str;

    /// BMC script that sets the duty cycle of every tray at once
    const FAN_SPEED_SCRIPT: &'static str;

    /// Thermal sensors reachable through the BMC
    const THERMAL_SENSORS: &'static [ThermalSensorSpec];

    /// BMC I2C bus carrying the PSU PMBus mux
    const PMBUS_MUX_BUS: u8;

    /// I2C address of the PSU PMBus mux
    const PMBUS_MUX_ADDR: u8;

    /// PSU endpoints, PSU1 first
    const PSU_CHANNELS: &'static [PsuChannel];

    /// Rated PSU capacity in watts
    const PSU_CAPACITY_WATTS: f64;
}

/// Accton Wedge 100S-32X
///
/// - 5 fan trays on the BMC fan board at i2c-8/0x33
/// - 7 TMP75 sensors on BMC i2c-3 and i2c-8
/// - 2 AC PSUs behind a PCA9546 mux on BMC i2c-7
pub struct Wedge100s32x;

const WEDGE100S_THERMALS: &[ThermalSensorSpec] = &[
    ThermalSensorSpec {
        name: "TMP75-1",
        path: "/sys/bus/i2c/devices/3-0048/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-2",
        path: "/sys/bus/i2c/devices/3-0049/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-3",
        path: "/sys/bus/i2c/devices/3-004a/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-4",
        path: "/sys/bus/i2c/devices/3-004b/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-5",
        path: "/sys/bus/i2c/devices/3-004c/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-6",
        path: "/sys/bus/i2c/devices/8-0048/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
    ThermalSensorSpec {
        name: "TMP75-7",
        path: "/sys/bus/i2c/devices/8-0049/hwmon/*/temp1_input",
        high_threshold: 70.0,
        high_critical_threshold: 80.0,
    },
];

const WEDGE100S_PSUS: &[PsuChannel] = &[
    PsuChannel {
        mux_channel: 0x02,
        pmbus_addr: 0x59,
    },
    PsuChannel {
        mux_channel: 0x01,
        pmbus_addr: 0x5a,
    },
];

impl BoardConfig for Wedge100s32x {
    const NAME: &'static str = "Accton Wedge 100S-32X";
    const FAN_TRAY_COUNT: u8 = 5;
    const MAX_FAN_RPM: u32 = 15400;
    const FAN_SPEED_TOLERANCE: u8 = 20;
    const FAN_BOARD_PATH: &'static str = "/sys/bus/i2c/devices/8-0033/";
    const FAN_SPEED_SCRIPT: &'static str = "set_fan_speed.sh";
    const THERMAL_SENSORS: &'static [ThermalSensorSpec] = WEDGE100S_THERMALS;
    const PMBUS_MUX_BUS: u8 = 7;
    const PMBUS_MUX_ADDR: u8 = 0x70;
    const PSU_CHANNELS: &'static [PsuChannel] = WEDGE100S_PSUS;
    const PSU_CAPACITY_WATTS: f64 = 650.0;
}

/// Default board type used throughout the codebase
pub type DefaultBoard = Wedge100s32x;

/// Helper struct for validating indices against a board type
///
/// Trays and PSUs are numbered from 1 like the front-panel labels; thermal
/// sensors are numbered from 0 in table order.
#[derive(Debug, Clone, Copy)]
pub struct Board<B: BoardConfig> {
    _marker: PhantomData<B>,
}

impl<B: BoardConfig> Board<B> {
    /// Create a new board marker instance
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Get the board name
    pub fn name(&self) -> &'static str {
        B::NAME
    }

    /// Validate a 1-based fan tray index
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the tray is 0 or above `FAN_TRAY_COUNT`
    pub fn validate_tray(&self, tray: u8) -> crate::Result<()> {
        if tray == 0 || tray > B::FAN_TRAY_COUNT {
            return Err(crate::BmcError::InvalidInput(format!(
                "Fan tray out of range: {} (must be 1-{})",
                tray,
                B::FAN_TRAY_COUNT
            )));
        }
        Ok(())
    }

    /// Validate a 0-based thermal sensor index
    pub fn validate_thermal(&self, index: usize) -> crate::Result<()> {
        if index >= B::THERMAL_SENSORS.len() {
            return Err(crate::BmcError::InvalidInput(format!(
                "Thermal sensor out of range: {} (must be 0-{})",
                index,
                B::THERMAL_SENSORS.len() - 1
            )));
        }
        Ok(())
    }

    /// Validate a 1-based PSU index
    pub fn validate_psu(&self, psu: u8) -> crate::Result<()> {
        if psu == 0 || psu as usize > B::PSU_CHANNELS.len() {
            return Err(crate::BmcError::InvalidInput(format!(
                "PSU out of range: {} (must be 1-{})",
                psu,
                B::PSU_CHANNELS.len()
            )));
        }
        Ok(())
    }
}

impl<B: BoardConfig> Default for Board<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wedge100s_config() {
        assert_eq!(Wedge100s32x::NAME, "Accton Wedge 100S-32X");
        assert_eq!(Wedge100s32x::FAN_TRAY_COUNT, 5);
        assert_eq!(Wedge100s32x::MAX_FAN_RPM, 15400);
        assert_eq!(Wedge100s32x::THERMAL_SENSORS.len(), 7);
        assert_eq!(Wedge100s32x::PSU_CHANNELS.len(), 2);
        assert!(Wedge100s32x::FAN_BOARD_PATH.ends_with('/'));
    }

    #[test]
    fn test_psu_channels_match_mux_wiring() {
        let psu1 = Wedge100s32x::PSU_CHANNELS[0];
        let psu2 = Wedge100s32x::PSU_CHANNELS[1];
        assert_eq!((psu1.mux_channel, psu1.pmbus_addr), (0x02, 0x59));
        assert_eq!((psu2.mux_channel, psu2.pmbus_addr), (0x01, 0x5a));
    }

    #[test]
    fn test_board_tray_validation() {
        let board = Board::<Wedge100s32x>::new();

        assert!(board.validate_tray(1).is_ok());
        assert!(board.validate_tray(5).is_ok());

        assert!(board.validate_tray(0).is_err());
        assert!(board.validate_tray(6).is_err());
    }

    #[test]
    fn test_board_thermal_and_psu_validation() {
        let board = Board::<DefaultBoard>::default();

        assert!(board.validate_thermal(0).is_ok());
        assert!(board.validate_thermal(6).is_ok());
        assert!(board.validate_thermal(7).is_err());

        assert!(board.validate_psu(1).is_ok());
        assert!(board.validate_psu(2).is_ok());
        assert!(board.validate_psu(0).is_err());
        assert!(board.validate_psu(3).is_err());
    }

    #[test]
    fn test_board_name() {
        assert_eq!(Board::<Wedge100s32x>::new().name(), Wedge100s32x::NAME);
    }
}
