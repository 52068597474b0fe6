//! Fan trays
//!
//! All fan data lives on the BMC fan board. Each tray has a front and a
//! rear rotor; the tray reports the slower of the two, so a single stalled
//! rotor marks the tray as failed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use wedgebmc_core::{
    Board, BoardConfig, DefaultBoard, FanDirection, FanStatus, Result, RotorPair,
};

use crate::cache::TelemetryCache;
use crate::channel::ShellChannel;

/// Fan trays of one board, read and driven through the BMC shell
pub struct FanTrays<C: ShellChannel + ?Sized = dyn ShellChannel, B: BoardConfig = DefaultBoard> {
    channel: Arc<C>,
    board: Board<B>,
    ttl: Duration,
    presence: TelemetryCache<String, i64>,
    rotors: TelemetryCache<u8, RotorPair>,
    // One script drives every tray, so one target covers them all
    target_percent: Mutex<Option<u8>>,
}

impl<C: ShellChannel + ?Sized, B: BoardConfig> FanTrays<C, B> {
    pub fn new(channel: Arc<C>, ttl: Duration) -> Self {
        Self {
            channel,
            board: Board::new(),
            ttl,
            presence: TelemetryCache::new(),
            rotors: TelemetryCache::new(),
            target_percent: Mutex::new(None),
        }
    }

    pub fn count(&self) -> u8 {
        B::FAN_TRAY_COUNT
    }

    fn presence_path() -> String {
        format!("{}fantray_present", B::FAN_BOARD_PATH)
    }

    fn rotor_path(rotor: u8) -> String {
        format!("{}fan{}_input", B::FAN_BOARD_PATH, rotor)
    }

    /// True when the tray is installed. An unreadable bitmask reads as absent.
    pub fn is_present(&self, tray: u8) -> Result<bool> {
        self.board.validate_tray(tray)?;

        let path = Self::presence_path();
        let mask = self
            .presence
            .get_or_try_fetch(path.clone(), self.ttl, || self.channel.file_read_int(&path, 16));

        // A set bit means the tray is absent
        Ok(mask.is_some_and(|mask| mask & (1 << (tray - 1)) == 0))
    }

    /// Front and rear rotor RPM
    pub fn rotors(&self, tray: u8) -> Result<RotorPair> {
        self.board.validate_tray(tray)?;

        Ok(self.rotors.get_or_fetch(tray, self.ttl, || {
            let read = |rotor: u8| {
                self.channel
                    .file_read_int(&Self::rotor_path(rotor), 10)
                    .and_then(|rpm| u32::try_from(rpm).ok())
            };
            let pair = RotorPair {
                front: read(tray * 2 - 1),
                rear: read(tray * 2),
            };
            debug!("Tray {} rotors: {:?}", tray, pair);
            pair
        }))
    }

    /// Slowest rotor RPM, `None` when neither rotor could be read
    pub fn speed_rpm(&self, tray: u8) -> Result<Option<u32>> {
        Ok(self.rotors(tray)?.min_rpm())
    }

    /// Speed as a percentage of the board maximum, 0 when stalled or unreadable
    pub fn speed_percent(&self, tray: u8) -> Result<u8> {
        Ok(self
            .speed_rpm(tray)?
            .map(|rpm| percent_of_max(rpm, B::MAX_FAN_RPM))
            .unwrap_or(0))
    }

    /// Present with at least one rotor turning
    pub fn is_ok(&self, tray: u8) -> Result<bool> {
        if !self.is_present(tray)? {
            return Ok(false);
        }
        Ok(self.speed_rpm(tray)?.is_some_and(|rpm| rpm > 0))
    }

    /// Airflow is fixed front-to-back on this platform.
    pub fn direction(&self) -> FanDirection {
        FanDirection::Intake
    }

    /// Last duty cycle applied through [`set_speed`](Self::set_speed)
    pub fn target_speed(&self) -> Option<u8> {
        *self
            .target_percent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn speed_tolerance(&self) -> u8 {
        B::FAN_SPEED_TOLERANCE
    }

    /// Set every tray to `percent` of maximum (clamped to 100).
    ///
    /// Returns false when the BMC did not confirm the command.
    pub fn set_speed(&self, percent: u32) -> bool {
        let percent = percent.min(100) as u8;

        let command = format!("{} {}", B::FAN_SPEED_SCRIPT, percent);
        if self.channel.send(&command).is_none() {
            warn!("Failed to set fan speed to {}%", percent);
            return false;
        }

        *self
            .target_percent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(percent);
        // Next read must reflect the new duty cycle
        self.rotors.clear();
        info!("Fan speed set to {}%", percent);
        true
    }

    pub fn status(&self, tray: u8) -> Result<FanStatus> {
        let present = self.is_present(tray)?;
        let rotors = self.rotors(tray)?;
        let rpm = rotors.min_rpm();

        Ok(FanStatus {
            tray,
            name: format!("FanTray {}", tray),
            present,
            rotors,
            rpm,
            speed_percent: rpm.map(|r| percent_of_max(r, B::MAX_FAN_RPM)).unwrap_or(0),
            target_percent: self.target_speed(),
            direction: self.direction(),
            ok: present && rpm.is_some_and(|r| r > 0),
        })
    }

    pub fn statuses(&self) -> Result<Vec<FanStatus>> {
        (1..=B::FAN_TRAY_COUNT).map(|tray| self.status(tray)).collect()
    }
}

/// `rpm` as a whole percentage of `max`, capped at 100
pub fn percent_of_max(rpm: u32, max: u32) -> u8 {
    if max == 0 {
        return 0;
    }
    ((u64::from(rpm) * 100 / u64::from(max)).min(100)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wedgebmc_core::{BmcError, Wedge100s32x};

    const BOARD: &str = "/sys/bus/i2c/devices/8-0033/";

    /// File-backed shell that counts exchanges
    #[derive(Default)]
    struct FileShell {
        files: Mutex<HashMap<String, String>>,
        sends: AtomicUsize,
        reject_writes: bool,
    }

    impl FileShell {
        fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: Mutex::new(
                    files
                        .iter()
                        .map(|(k, v)| (format!("{}{}", BOARD, k), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn set(&self, name: &str, value: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(format!("{}{}", BOARD, name), value.to_string());
        }
    }

    impl ShellChannel for FileShell {
        fn send(&self, command: &str) -> Option<String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if let Some(path) = command.strip_prefix("cat ") {
                let files = self.files.lock().unwrap();
                let out = files.get(path)?;
                return Some(format!("{}\r\n{}\r\nroot@bmc:~# ", command, out));
            }
            if self.reject_writes {
                return None;
            }
            Some(format!("{}\r\nroot@bmc:~# ", command))
        }
    }

    fn all_present() -> FileShell {
        let mut files = vec![("fantray_present", "0x0")];
        let rpms = [
            ("fan1_input", "7500"),
            ("fan2_input", "4950"),
            ("fan3_input", "7600"),
            ("fan4_input", "5000"),
            ("fan5_input", "7400"),
            ("fan6_input", "0"),
            ("fan7_input", "7500"),
            ("fan9_input", "7500"),
            ("fan10_input", "5100"),
        ];
        files.extend_from_slice(&rpms);
        FileShell::with(&files)
    }

    fn trays(shell: Arc<FileShell>) -> FanTrays<FileShell, Wedge100s32x> {
        FanTrays::new(shell, Duration::from_secs(60))
    }

    #[test]
    fn test_presence_bitmask() {
        let shell = Arc::new(FileShell::with(&[("fantray_present", "0x14")]));
        let fans = trays(shell);

        assert!(fans.is_present(1).unwrap());
        assert!(fans.is_present(2).unwrap());
        assert!(!fans.is_present(3).unwrap());
        assert!(fans.is_present(4).unwrap());
        assert!(!fans.is_present(5).unwrap());
    }

    #[test]
    fn test_unreadable_presence_is_absent_and_not_cached() {
        let shell = Arc::new(FileShell::default());
        let fans = trays(shell.clone());

        assert!(!fans.is_present(1).unwrap());
        shell.set("fantray_present", "0x0");
        assert!(fans.is_present(1).unwrap());
    }

    #[test]
    fn test_speed_is_slowest_rotor() {
        let fans = trays(Arc::new(all_present()));

        assert_eq!(fans.speed_rpm(1).unwrap(), Some(4950));
        assert_eq!(fans.speed_percent(1).unwrap(), 32);
        assert!(fans.is_ok(1).unwrap());

        // Rear rotor stalled
        assert_eq!(fans.speed_rpm(3).unwrap(), Some(0));
        assert_eq!(fans.speed_percent(3).unwrap(), 0);
        assert!(!fans.is_ok(3).unwrap());

        // Rear rotor unreadable
        assert_eq!(fans.speed_rpm(4).unwrap(), Some(7500));
    }

    #[test]
    fn test_rotor_reads_are_cached() {
        let shell = Arc::new(all_present());
        let fans = trays(shell.clone());

        fans.speed_rpm(1).unwrap();
        fans.speed_percent(1).unwrap();
        fans.is_ok(1).unwrap();

        // Two rotor reads plus one presence read
        assert_eq!(shell.sends.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_set_speed_records_target_and_refreshes_rotors() {
        let shell = Arc::new(all_present());
        let fans = trays(shell.clone());

        assert_eq!(fans.target_speed(), None);
        assert_eq!(fans.speed_rpm(1).unwrap(), Some(4950));

        shell.set("fan2_input", "9000");
        shell.set("fan1_input", "10000");
        assert!(fans.set_speed(250));
        assert_eq!(fans.target_speed(), Some(100));
        assert_eq!(fans.speed_rpm(1).unwrap(), Some(9000));
    }

    #[test]
    fn test_failed_set_speed_keeps_target() {
        let shell = Arc::new(FileShell {
            reject_writes: true,
            ..all_present()
        });
        let fans = trays(shell);

        assert!(!fans.set_speed(40));
        assert_eq!(fans.target_speed(), None);
    }

    #[test]
    fn test_invalid_tray() {
        let fans = trays(Arc::new(all_present()));
        assert!(matches!(fans.status(0), Err(BmcError::InvalidInput(_))));
        assert!(matches!(fans.rotors(6), Err(BmcError::InvalidInput(_))));
    }

    #[test]
    fn test_statuses() {
        let fans = trays(Arc::new(all_present()));
        let statuses = fans.statuses().unwrap();

        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[0].name, "FanTray 1");
        assert_eq!(statuses[0].direction, FanDirection::Intake);
        assert!(statuses[0].ok);
        assert!(!statuses[2].ok);
        assert_eq!(fans.speed_tolerance(), 20);
    }

    #[test]
    fn test_percent_of_max() {
        assert_eq!(percent_of_max(15400, 15400), 100);
        assert_eq!(percent_of_max(20000, 15400), 100);
        assert_eq!(percent_of_max(7700, 15400), 50);
        assert_eq!(percent_of_max(100, 0), 0);
    }
}
