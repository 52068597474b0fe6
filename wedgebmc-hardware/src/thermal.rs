//! Thermal sensors on the BMC I2C buses
//!
//! Readings are millidegrees from hwmon sysfs. The hwmon directory number is
//! not stable, so sensor paths carry a wildcard that the BMC shell expands;
//! the decoder matches the unexpanded command in the echo.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use wedgebmc_core::{
    Board, BoardConfig, BmcError, DefaultBoard, Result, ThermalSensorSpec, ThermalStatus,
};

use crate::channel::ShellChannel;

#[derive(Debug, Clone)]
struct SensorState {
    high: f64,
    critical: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl From<&ThermalSensorSpec> for SensorState {
    fn from(spec: &ThermalSensorSpec) -> Self {
        Self {
            high: spec.high_threshold,
            critical: spec.high_critical_threshold,
            min: None,
            max: None,
        }
    }
}

/// Thermal sensors of one board
///
/// Temperatures are never cached; each read also updates the recorded
/// minimum and maximum.
pub struct Thermals<C: ShellChannel + ?Sized = dyn ShellChannel, B: BoardConfig = DefaultBoard> {
    channel: Arc<C>,
    board: Board<B>,
    state: Mutex<Vec<SensorState>>,
}

impl<C: ShellChannel + ?Sized, B: BoardConfig> Thermals<C, B> {
    pub fn new(channel: Arc<C>) -> Self {
        Self {
            channel,
            board: Board::new(),
            state: Mutex::new(B::THERMAL_SENSORS.iter().map(SensorState::from).collect()),
        }
    }

    pub fn count(&self) -> usize {
        B::THERMAL_SENSORS.len()
    }

    fn state(&self) -> MutexGuard<'_, Vec<SensorState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spec(&self, index: usize) -> Result<&'static ThermalSensorSpec> {
        self.board.validate_thermal(index)?;
        Ok(&B::THERMAL_SENSORS[index])
    }

    pub fn name(&self, index: usize) -> Result<&'static str> {
        Ok(self.spec(index)?.name)
    }

    /// Current temperature in °C, `None` when the sensor is unreadable
    pub fn temperature(&self, index: usize) -> Result<Option<f64>> {
        let spec = self.spec(index)?;

        let temp = self
            .channel
            .file_read_int(spec.path, 10)
            .map(|milli| milli as f64 / 1000.0);

        if let Some(t) = temp {
            let mut state = self.state();
            let sensor = &mut state[index];
            sensor.min = Some(sensor.min.map_or(t, |m| m.min(t)));
            sensor.max = Some(sensor.max.map_or(t, |m| m.max(t)));
        } else {
            debug!("{} unreadable", spec.name);
        }

        Ok(temp)
    }

    /// Readable means healthy; the sensors are soldered down.
    pub fn is_ok(&self, index: usize) -> Result<bool> {
        Ok(self.temperature(index)?.is_some())
    }

    pub fn high_threshold(&self, index: usize) -> Result<f64> {
        self.spec(index)?;
        Ok(self.state()[index].high)
    }

    pub fn high_critical_threshold(&self, index: usize) -> Result<f64> {
        self.spec(index)?;
        Ok(self.state()[index].critical)
    }

    pub fn set_high_threshold(&self, index: usize, celsius: f64) -> Result<()> {
        self.spec(index)?;
        check_finite(celsius)?;
        self.state()[index].high = celsius;
        Ok(())
    }

    pub fn set_high_critical_threshold(&self, index: usize, celsius: f64) -> Result<()> {
        self.spec(index)?;
        check_finite(celsius)?;
        self.state()[index].critical = celsius;
        Ok(())
    }

    /// Lowest temperature seen since construction
    pub fn minimum_recorded(&self, index: usize) -> Result<Option<f64>> {
        self.spec(index)?;
        Ok(self.state()[index].min)
    }

    /// Highest temperature seen since construction
    pub fn maximum_recorded(&self, index: usize) -> Result<Option<f64>> {
        self.spec(index)?;
        Ok(self.state()[index].max)
    }

    pub fn status(&self, index: usize) -> Result<ThermalStatus> {
        let temperature = self.temperature(index)?;
        let name = self.name(index)?.to_string();
        let state = self.state()[index].clone();

        Ok(ThermalStatus {
            index,
            name,
            temperature,
            high_threshold: state.high,
            high_critical_threshold: state.critical,
            minimum_recorded: state.min,
            maximum_recorded: state.max,
        })
    }

    pub fn statuses(&self) -> Result<Vec<ThermalStatus>> {
        (0..self.count()).map(|index| self.status(index)).collect()
    }
}

fn check_finite(celsius: f64) -> Result<()> {
    if !celsius.is_finite() {
        return Err(BmcError::InvalidInput(format!(
            "Threshold must be a finite temperature, got {}",
            celsius
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use wedgebmc_core::Wedge100s32x;

    /// Answers every `cat` with the next queued reading
    struct Readings {
        queue: Mutex<VecDeque<Option<&'static str>>>,
    }

    impl Readings {
        fn new(values: Vec<Option<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                queue: Mutex::new(values.into()),
            })
        }
    }

    impl ShellChannel for Readings {
        fn send(&self, command: &str) -> Option<String> {
            let value = self.queue.lock().unwrap().pop_front().flatten()?;
            Some(format!("{}\r\n{}\r\nroot@bmc:~# ", command, value))
        }
    }

    fn thermals(channel: Arc<Readings>) -> Thermals<Readings, Wedge100s32x> {
        Thermals::new(channel)
    }

    #[test]
    fn test_millidegrees_to_celsius() {
        let sensors = thermals(Readings::new(vec![Some("23750")]));
        assert_eq!(sensors.temperature(0).unwrap(), Some(23.75));
        assert_eq!(sensors.name(0).unwrap(), "TMP75-1");
    }

    #[test]
    fn test_records_min_and_max() {
        let sensors = thermals(Readings::new(vec![
            Some("30000"),
            Some("25500"),
            None,
            Some("41000"),
        ]));

        for _ in 0..4 {
            sensors.temperature(3).unwrap();
        }

        assert_eq!(sensors.minimum_recorded(3).unwrap(), Some(25.5));
        assert_eq!(sensors.maximum_recorded(3).unwrap(), Some(41.0));
        assert_eq!(sensors.minimum_recorded(2).unwrap(), None);
    }

    #[test]
    fn test_unreadable_sensor() {
        let sensors = thermals(Readings::new(vec![None]));
        assert!(!sensors.is_ok(6).unwrap());
    }

    #[test]
    fn test_thresholds_are_settable() {
        let sensors = thermals(Readings::new(vec![]));

        assert_eq!(sensors.high_threshold(1).unwrap(), 70.0);
        assert_eq!(sensors.high_critical_threshold(1).unwrap(), 80.0);

        sensors.set_high_threshold(1, 65.0).unwrap();
        sensors.set_high_critical_threshold(1, 75.5).unwrap();
        assert_eq!(sensors.high_threshold(1).unwrap(), 65.0);
        assert_eq!(sensors.high_critical_threshold(1).unwrap(), 75.5);
        // Other sensors keep their defaults
        assert_eq!(sensors.high_threshold(2).unwrap(), 70.0);

        assert!(sensors.set_high_threshold(1, f64::NAN).is_err());
    }

    #[test]
    fn test_invalid_index() {
        let sensors = thermals(Readings::new(vec![]));
        assert!(matches!(
            sensors.temperature(7),
            Err(BmcError::InvalidInput(_))
        ));
        assert!(sensors.set_high_threshold(99, 50.0).is_err());
    }

    #[test]
    fn test_status() {
        let sensors = thermals(Readings::new(vec![Some("21100")]));
        let status = sensors.status(4).unwrap();

        assert_eq!(status.name, "TMP75-5");
        assert_eq!(status.temperature, Some(21.1));
        assert_eq!(status.maximum_recorded, Some(21.1));
        assert_eq!(status.high_threshold, 70.0);
    }
}
