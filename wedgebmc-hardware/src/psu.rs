//! PSU telemetry over PMBus
//!
//! Both PSUs sit behind a PCA9546 mux on one BMC bus. A snapshot selects the
//! PSU's mux channel, then reads the four LINEAR11 registers as words.
//! Output voltage is derived as POUT / IOUT.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use wedgebmc_core::pmbus::{decode_linear11, PmbusRegister};
use wedgebmc_core::{Board, BoardConfig, DefaultBoard, PsuStatus, PsuTelemetry, Result};

use crate::cache::TelemetryCache;
use crate::channel::ShellChannel;

/// PSUs of one board
pub struct Psus<C: ShellChannel + ?Sized = dyn ShellChannel, B: BoardConfig = DefaultBoard> {
    channel: Arc<C>,
    board: Board<B>,
    ttl: Duration,
    snapshots: TelemetryCache<String, PsuTelemetry>,
    // Keeps a mux select and the reads behind it together
    refresh: Mutex<()>,
}

impl<C: ShellChannel + ?Sized, B: BoardConfig> Psus<C, B> {
    pub fn new(channel: Arc<C>, ttl: Duration) -> Self {
        Self {
            channel,
            board: Board::new(),
            ttl,
            snapshots: TelemetryCache::new(),
            refresh: Mutex::new(()),
        }
    }

    pub fn count(&self) -> u8 {
        B::PSU_CHANNELS.len() as u8
    }

    fn key(psu: u8) -> String {
        format!("psu {} snapshot", psu)
    }

    /// Cached PMBus readings for a 1-based PSU index
    ///
    /// A failed refresh is cached as an empty snapshot for the full TTL.
    /// Hits never wait on a refresh of the other PSU.
    pub fn snapshot(&self, psu: u8) -> Result<PsuTelemetry> {
        self.board.validate_psu(psu)?;

        let key = Self::key(psu);
        if let Some(cached) = self.snapshots.get(&key, self.ttl) {
            return Ok(cached);
        }

        let _guard = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refreshed while we waited
        Ok(self.snapshots.get_or_fetch(key, self.ttl, || self.read(psu)))
    }

    fn read(&self, psu: u8) -> PsuTelemetry {
        let channel = B::PSU_CHANNELS[usize::from(psu - 1)];

        if !self
            .channel
            .i2cset_direct(B::PMBUS_MUX_BUS, B::PMBUS_MUX_ADDR, channel.mux_channel)
        {
            warn!("PSU {}: mux select failed", psu);
            return PsuTelemetry::default();
        }

        let read = |register: PmbusRegister| {
            self.channel
                .i2cget_word(B::PMBUS_MUX_BUS, channel.pmbus_addr, register.addr())
                .map(decode_linear11)
        };

        let input_voltage = read(PmbusRegister::ReadVin);
        let input_current = read(PmbusRegister::ReadIin);
        let output_current = read(PmbusRegister::ReadIout);
        let output_power = read(PmbusRegister::ReadPout);

        // No load means no meaningful ratio
        let output_voltage = match (output_power, output_current) {
            (Some(pout), Some(iout)) if iout > 0.0 => Some(pout / iout),
            _ => None,
        };

        let telemetry = PsuTelemetry {
            input_voltage,
            input_current,
            output_current,
            output_power,
            output_voltage,
        };
        debug!("PSU {} telemetry: {:?}", psu, telemetry);
        telemetry
    }

    /// Input voltage in V
    pub fn input_voltage(&self, psu: u8) -> Result<Option<f64>> {
        Ok(self.snapshot(psu)?.input_voltage)
    }

    /// Input current in A
    pub fn input_current(&self, psu: u8) -> Result<Option<f64>> {
        Ok(self.snapshot(psu)?.input_current)
    }

    /// Output current in A
    pub fn output_current(&self, psu: u8) -> Result<Option<f64>> {
        Ok(self.snapshot(psu)?.output_current)
    }

    /// Output power in W
    pub fn output_power(&self, psu: u8) -> Result<Option<f64>> {
        Ok(self.snapshot(psu)?.output_power)
    }

    /// Output voltage in V
    pub fn output_voltage(&self, psu: u8) -> Result<Option<f64>> {
        Ok(self.snapshot(psu)?.output_voltage)
    }

    pub fn capacity(&self) -> f64 {
        B::PSU_CAPACITY_WATTS
    }

    /// Drop the cached snapshot so the next read goes to the BMC
    pub fn invalidate(&self, psu: u8) {
        self.snapshots.invalidate(&Self::key(psu));
    }

    pub fn status(&self, psu: u8) -> Result<PsuStatus> {
        Ok(PsuStatus {
            psu,
            name: format!("PSU-{}", psu),
            capacity_watts: self.capacity(),
            telemetry: self.snapshot(psu)?,
        })
    }

    pub fn statuses(&self) -> Result<Vec<PsuStatus>> {
        (1..=self.count()).map(|psu| self.status(psu)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;
    use std::time::Instant;
    use wedgebmc_core::{BmcError, Wedge100s32x};

    /// Records every command and answers i2cget from a register table
    #[derive(Default)]
    struct PmbusShell {
        words: HashMap<String, &'static str>,
        mux_fails: bool,
        // Commands naming this address take 100 ms each
        slow_addr: Option<&'static str>,
        log: Mutex<Vec<String>>,
    }

    impl PmbusShell {
        fn live_psu2() -> Self {
            let words = [
                ("i2cget -f -y 7 0x5a 0x88 w", "0xf398"),
                ("i2cget -f -y 7 0x5a 0x89 w", "0xe00c"),
                ("i2cget -f -y 7 0x5a 0x8c w", "0xe850"),
                ("i2cget -f -y 7 0x5a 0x96 w", "0x0078"),
                ("i2cget -f -y 7 0x59 0x88 w", "0x0000"),
                ("i2cget -f -y 7 0x59 0x89 w", "0x0000"),
                ("i2cget -f -y 7 0x59 0x8c w", "0x0000"),
                ("i2cget -f -y 7 0x59 0x96 w", "0x0000"),
            ];
            Self {
                words: words.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                ..Default::default()
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl ShellChannel for PmbusShell {
        fn send(&self, command: &str) -> Option<String> {
            self.log.lock().unwrap().push(command.to_string());
            if self.slow_addr.is_some_and(|addr| command.contains(addr)) {
                thread::sleep(Duration::from_millis(100));
            }
            if command.starts_with("i2cset") {
                if self.mux_fails {
                    return None;
                }
                return Some(format!("{}\r\nroot@bmc:~# ", command));
            }
            let value = self.words.get(command)?;
            Some(format!("{}\r\n{}\r\nroot@bmc:~# ", command, value))
        }
    }

    fn psus(shell: Arc<PmbusShell>) -> Psus<PmbusShell, Wedge100s32x> {
        Psus::new(shell, Duration::from_secs(60))
    }

    #[test]
    fn test_snapshot_decodes_registers() {
        let shell = Arc::new(PmbusShell::live_psu2());
        let psus = psus(shell.clone());

        let t = psus.snapshot(2).unwrap();
        assert_eq!(t.input_voltage, Some(230.0));
        assert_eq!(t.input_current, Some(0.75));
        assert_eq!(t.output_current, Some(10.0));
        assert_eq!(t.output_power, Some(120.0));
        assert_eq!(t.output_voltage, Some(12.0));

        let log = shell.log();
        assert_eq!(log[0], "i2cset -f -y 7 0x70 0x01");
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_no_load_has_no_output_voltage() {
        let psus = psus(Arc::new(PmbusShell::live_psu2()));

        let t = psus.snapshot(1).unwrap();
        assert_eq!(t.output_current, Some(0.0));
        assert_eq!(t.output_voltage, None);
    }

    #[test]
    fn test_snapshot_is_cached() {
        let shell = Arc::new(PmbusShell::live_psu2());
        let psus = psus(shell.clone());

        psus.input_voltage(2).unwrap();
        psus.output_power(2).unwrap();
        psus.output_voltage(2).unwrap();
        assert_eq!(shell.log().len(), 5);

        psus.invalidate(2);
        psus.output_current(2).unwrap();
        assert_eq!(shell.log().len(), 10);
    }

    #[test]
    fn test_cached_psu_does_not_wait_for_other_refresh() {
        let shell = Arc::new(PmbusShell {
            slow_addr: Some("0x5a"),
            ..PmbusShell::live_psu2()
        });
        let psus = Arc::new(psus(shell));
        psus.snapshot(1).unwrap();

        let refreshing = {
            let psus = psus.clone();
            thread::spawn(move || psus.snapshot(2).unwrap())
        };
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        assert_eq!(psus.snapshot(1).unwrap().input_voltage, Some(0.0));
        assert!(started.elapsed() < Duration::from_millis(50));

        assert_eq!(refreshing.join().unwrap().input_voltage, Some(230.0));
    }

    #[test]
    fn test_concurrent_misses_refresh_once() {
        let shell = Arc::new(PmbusShell {
            slow_addr: Some("0x5a"),
            ..PmbusShell::live_psu2()
        });
        let psus = Arc::new(psus(shell.clone()));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let psus = psus.clone();
                thread::spawn(move || psus.snapshot(2).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().output_voltage, Some(12.0));
        }

        // One mux select and four reads; the second caller found the refresh
        assert_eq!(shell.log().len(), 5);
    }

    #[test]
    fn test_failed_mux_select_caches_empty_snapshot() {
        let shell = Arc::new(PmbusShell {
            mux_fails: true,
            ..PmbusShell::live_psu2()
        });
        let psus = psus(shell.clone());

        assert!(psus.snapshot(2).unwrap().is_empty());
        assert!(psus.snapshot(2).unwrap().is_empty());
        // Only the one failed select; no register reads
        assert_eq!(shell.log(), vec!["i2cset -f -y 7 0x70 0x01".to_string()]);
    }

    #[test]
    fn test_status_and_range() {
        let psus = psus(Arc::new(PmbusShell::live_psu2()));

        let statuses = psus.statuses().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "PSU-1");
        assert_eq!(statuses[1].capacity_watts, 650.0);
        assert_eq!(statuses[1].telemetry.output_power, Some(120.0));

        assert!(matches!(psus.snapshot(0), Err(BmcError::InvalidInput(_))));
        assert!(matches!(psus.snapshot(3), Err(BmcError::InvalidInput(_))));
    }
}
