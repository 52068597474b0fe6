//! Simulated BMC console
//!
//! [`MockBmc`] plays the OpenBMC serial console: login banner, password
//! prompt, a root shell that echoes input, and just enough of `cat`,
//! `i2cget`, `i2cset` and the fan script to back the telemetry façade. It
//! implements [`LinkOpener`], so a `BmcClient<MockBmc>` runs the real
//! session, login and reader code against it.
//!
//! Clones share state, so a test can keep one handle for assertions while
//! the client owns another.

use glob::{MatchOptions, Pattern};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wedgebmc_core::{BmcError, BoardConfig, Result, Wedge100s32x};

use crate::serial_driver::{LinkOpener, ReadEvent, SerialLink};

const HOSTNAME: &str = "wedge-bmc";
const USERNAME: &str = "root";
const DEFAULT_PASSWORD: &str = "0penBmc";

/// Millidegree readings of the simulated TMP75 sensors, in table order
const THERMAL_READINGS: &[i64] = &[23750, 22900, 23100, 33300, 21100, 20600, 23000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LoggedOut,
    AwaitPassword,
    LoggedIn,
}

#[derive(Debug, Clone)]
struct FanBoard {
    path: String,
    trays: u8,
    max_rpm: u32,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    password: String,
    pending_user: String,
    files: HashMap<String, String>,
    bytes: HashMap<(u8, u8, u8), u8>,
    words: HashMap<(u8, u8, u8), u16>,
    direct_writes: Vec<(u8, u8, u8)>,
    fan_board: Option<FanBoard>,
    fan_duty: Option<u8>,

    fail_opens: usize,
    silent: bool,
    mute_prompt: bool,
    stale_prompt: bool,
    command_delay: Duration,

    opens: usize,
    failed_opens: usize,
    active: usize,
    max_active: usize,
    commands: Vec<String>,
    wakeups: usize,
    usernames: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            phase: Phase::LoggedOut,
            password: DEFAULT_PASSWORD.to_string(),
            pending_user: String::new(),
            files: HashMap::new(),
            bytes: HashMap::new(),
            words: HashMap::new(),
            direct_writes: Vec::new(),
            fan_board: None,
            fan_duty: None,
            fail_opens: 0,
            silent: false,
            mute_prompt: false,
            stale_prompt: false,
            command_delay: Duration::ZERO,
            opens: 0,
            failed_opens: 0,
            active: 0,
            max_active: 0,
            commands: Vec::new(),
            wakeups: 0,
            usernames: 0,
        }
    }
}

fn prompt() -> String {
    format!("root@{}:~# ", HOSTNAME)
}

impl State {
    /// Respond to one line typed at the console
    fn handle_line(&mut self, line: &str) -> Vec<Vec<u8>> {
        if line.is_empty() && self.phase != Phase::AwaitPassword {
            self.wakeups += 1;
        }
        if self.silent {
            return Vec::new();
        }

        match self.phase {
            Phase::LoggedOut if line.is_empty() => {
                vec![format!("\r\n{} login: ", HOSTNAME).into_bytes()]
            }
            Phase::LoggedOut => {
                self.usernames += 1;
                self.pending_user = line.to_string();
                self.phase = Phase::AwaitPassword;
                vec![
                    format!("{}\r\n", line).into_bytes(),
                    b"Password: ".to_vec(),
                ]
            }
            Phase::AwaitPassword => {
                if self.pending_user == USERNAME && line == self.password {
                    self.phase = Phase::LoggedIn;
                    vec![format!("\r\n{}", prompt()).into_bytes()]
                } else {
                    self.phase = Phase::LoggedOut;
                    vec![format!("\r\nLogin incorrect\r\n{} login: ", HOSTNAME).into_bytes()]
                }
            }
            Phase::LoggedIn if line.is_empty() => vec![format!("\r\n{}", prompt()).into_bytes()],
            Phase::LoggedIn => {
                self.commands.push(line.to_string());
                let mut bursts = vec![format!("{}\r\n", line).into_bytes()];
                let output = self.run(line);
                if !output.is_empty() {
                    bursts.push(output.into_bytes());
                }
                if !self.mute_prompt {
                    bursts.push(prompt().into_bytes());
                }
                bursts
            }
        }
    }

    /// Execute a shell command and return its output
    fn run(&mut self, line: &str) -> String {
        let args: Vec<&str> = line.split_whitespace().collect();

        match args.as_slice() {
            ["cat", path] => match self.find_file(path) {
                Some(contents) => format!("{}\r\n", contents),
                None => format!("cat: can't open '{}': No such file or directory\r\n", path),
            },
            ["i2cget", "-f", "-y", bus, addr, reg, rest @ ..] => {
                let Some(key) = parse_target(bus, addr, reg) else {
                    return "Error: Invalid arguments\r\n".to_string();
                };
                match rest {
                    [] => match self.bytes.get(&key) {
                        Some(v) => format!("0x{:02x}\r\n", v),
                        None => "Error: Read failed\r\n".to_string(),
                    },
                    ["w"] => match self.words.get(&key) {
                        Some(v) => format!("0x{:04x}\r\n", v),
                        None => "Error: Read failed\r\n".to_string(),
                    },
                    _ => "Error: Invalid mode\r\n".to_string(),
                }
            }
            ["i2cset", "-f", "-y", bus, addr, reg, value] => {
                match (parse_target(bus, addr, reg), parse_hex(value)) {
                    (Some(key), Some(value)) => {
                        self.bytes.insert(key, value);
                        String::new()
                    }
                    _ => "Error: Invalid arguments\r\n".to_string(),
                }
            }
            ["i2cset", "-f", "-y", bus, addr, value] => {
                match (bus.parse::<u8>().ok(), parse_hex(addr), parse_hex(value)) {
                    (Some(bus), Some(addr), Some(value)) => {
                        self.direct_writes.push((bus, addr, value));
                        String::new()
                    }
                    _ => "Error: Invalid arguments\r\n".to_string(),
                }
            }
            ["set_fan_speed.sh", pct] => match (pct.parse::<u8>(), self.fan_board.is_some()) {
                (Ok(pct), true) if pct <= 100 => {
                    self.set_fan_duty(pct);
                    format!("Setting fan speed to {}%\r\n", pct)
                }
                (_, true) => "Usage: set_fan_speed.sh <percent>\r\n".to_string(),
                (_, false) => "-sh: set_fan_speed.sh: not found\r\n".to_string(),
            },
            [program, ..] => format!("-sh: {}: not found\r\n", program),
            [] => String::new(),
        }
    }

    fn find_file(&self, pattern: &str) -> Option<&String> {
        if let Some(contents) = self.files.get(pattern) {
            return Some(contents);
        }
        let mut matches: Vec<&String> = self
            .files
            .keys()
            .filter(|path| glob_match(pattern, path))
            .collect();
        matches.sort();
        matches.first().and_then(|path| self.files.get(*path))
    }

    fn set_fan_duty(&mut self, pct: u8) {
        let Some(board) = self.fan_board.clone() else {
            return;
        };
        self.fan_duty = Some(pct);
        for tray in 1..=board.trays {
            let front = board.max_rpm * u32::from(pct) / 100;
            let rear = front * 2 / 3;
            self.files.insert(
                format!("{}fan{}_input", board.path, tray * 2 - 1),
                front.to_string(),
            );
            self.files.insert(
                format!("{}fan{}_input", board.path, tray * 2),
                rear.to_string(),
            );
        }
    }
}

fn parse_hex(text: &str) -> Option<u8> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u8::from_str_radix(digits, 16).ok()
}

fn parse_target(bus: &str, addr: &str, reg: &str) -> Option<(u8, u8, u8)> {
    Some((bus.parse().ok()?, parse_hex(addr)?, parse_hex(reg)?))
}

/// Shell-style match where `*` never crosses a `/`
fn glob_match(pattern: &str, path: &str) -> bool {
    let options = MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    Pattern::new(pattern)
        .map(|p| p.matches_with(path, options))
        .unwrap_or(false)
}

/// A simulated BMC reachable through [`LinkOpener`]
#[derive(Debug, Clone, Default)]
pub struct MockBmc {
    state: Arc<Mutex<State>>,
}

impl MockBmc {
    /// A console sitting at the login banner with no files
    pub fn new() -> Self {
        Self::default()
    }

    /// A console populated with the Wedge 100S-32X fan board, thermal
    /// sensors and PSUs (PSU1 without AC, PSU2 live)
    pub fn wedge100s() -> Self {
        Self::for_board::<Wedge100s32x>()
    }

    pub fn for_board<B: BoardConfig>() -> Self {
        let bmc = Self::new();
        {
            let mut state = bmc.lock();

            state.fan_board = Some(FanBoard {
                path: B::FAN_BOARD_PATH.to_string(),
                trays: B::FAN_TRAY_COUNT,
                max_rpm: B::MAX_FAN_RPM,
            });
            state
                .files
                .insert(format!("{}fantray_present", B::FAN_BOARD_PATH), "0x0".to_string());
            state.set_fan_duty(50);

            for (i, sensor) in B::THERMAL_SENSORS.iter().enumerate() {
                let path = sensor.path.replace('*', &format!("hwmon{}", i + 1));
                let reading = THERMAL_READINGS[i % THERMAL_READINGS.len()];
                state.files.insert(path, reading.to_string());
            }

            for (i, channel) in B::PSU_CHANNELS.iter().enumerate() {
                let words: [(u8, u16); 4] = if i == 0 {
                    [(0x88, 0), (0x89, 0), (0x8c, 0), (0x96, 0)]
                } else {
                    // 230 V, 0.75 A in; 10 A, 120 W out
                    [(0x88, 0xF398), (0x89, 0xE00C), (0x8c, 0xE850), (0x96, 0x0078)]
                };
                for (reg, word) in words {
                    state
                        .words
                        .insert((B::PMBUS_MUX_BUS, channel.pmbus_addr, reg), word);
                }
            }
        }
        bmc
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start at the root prompt instead of the login banner
    pub fn logged_in(self) -> Self {
        self.lock().phase = Phase::LoggedIn;
        self
    }

    /// Produce no output at all
    pub fn silent(self) -> Self {
        self.set_silent(true);
        self
    }

    /// Echo commands and their output but never print the prompt after them
    pub fn mute_prompt_after_command(self) -> Self {
        self.lock().mute_prompt = true;
        self
    }

    /// Fail the next `count` opens as if the device were busy
    pub fn fail_opens(self, count: usize) -> Self {
        self.lock().fail_opens = count;
        self
    }

    /// Leave a prompt from a previous session in the input queue on open
    pub fn stale_prompt_on_open(self) -> Self {
        self.lock().stale_prompt = true;
        self
    }

    /// Pause before answering each command
    pub fn command_delay(self, delay: Duration) -> Self {
        self.lock().command_delay = delay;
        self
    }

    pub fn with_password(self, password: &str) -> Self {
        self.lock().password = password.to_string();
        self
    }

    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.set_file(path, contents);
        self
    }

    pub fn with_byte(self, bus: u8, addr: u8, reg: u8, value: u8) -> Self {
        self.lock().bytes.insert((bus, addr, reg), value);
        self
    }

    pub fn with_word(self, bus: u8, addr: u8, reg: u8, value: u16) -> Self {
        self.lock().words.insert((bus, addr, reg), value);
        self
    }

    pub fn set_file(&self, path: &str, contents: &str) {
        self.lock()
            .files
            .insert(path.to_string(), contents.to_string());
    }

    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn byte(&self, bus: u8, addr: u8, reg: u8) -> Option<u8> {
        self.lock().bytes.get(&(bus, addr, reg)).copied()
    }

    /// Register-less writes as `(bus, addr, value)`, oldest first
    pub fn direct_writes(&self) -> Vec<(u8, u8, u8)> {
        self.lock().direct_writes.clone()
    }

    pub fn fan_duty(&self) -> Option<u8> {
        self.lock().fan_duty
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().phase == Phase::LoggedIn
    }

    /// Successful opens
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn failed_opens(&self) -> usize {
        self.lock().failed_opens
    }

    /// Links currently open
    pub fn active_sessions(&self) -> usize {
        self.lock().active
    }

    /// Most links ever open at the same time
    pub fn max_concurrent_sessions(&self) -> usize {
        self.lock().max_active
    }

    /// Commands run at the root prompt, oldest first
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Bare carriage returns received outside the password prompt
    pub fn wakeups(&self) -> usize {
        self.lock().wakeups
    }

    /// Usernames typed at the login banner
    pub fn usernames_received(&self) -> usize {
        self.lock().usernames
    }
}

impl LinkOpener for MockBmc {
    type Link = MockLink;

    fn open_link(&self) -> Result<MockLink> {
        let mut state = self.lock();

        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            state.failed_opens += 1;
            return Err(BmcError::Serial(format!(
                "Failed to open {}: Device or resource busy",
                self.device()
            )));
        }

        state.opens += 1;
        state.active += 1;
        state.max_active = state.max_active.max(state.active);

        let mut output = VecDeque::new();
        if state.stale_prompt && state.phase == Phase::LoggedIn && !state.silent {
            output.push_back(format!("\r\n{}", prompt()).into_bytes());
        }

        Ok(MockLink {
            state: self.state.clone(),
            output,
            line: Vec::new(),
        })
    }

    fn device(&self) -> &str {
        "mock://wedge-bmc"
    }
}

/// One open link to a [`MockBmc`]
///
/// Each poll delivers at most one burst of output, so responses arrive in
/// several chunks the way they do over USB.
pub struct MockLink {
    state: Arc<Mutex<State>>,
    output: VecDeque<Vec<u8>>,
    line: Vec<u8>,
}

impl MockLink {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SerialLink for MockLink {
    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<ReadEvent> {
        let Some(mut burst) = self.output.pop_front() else {
            thread::sleep(wait);
            return Ok(ReadEvent::Idle);
        };

        if burst.len() > buf.len() {
            let rest = burst.split_off(buf.len());
            self.output.push_front(rest);
        }
        buf[..burst.len()].copy_from_slice(&burst);
        Ok(ReadEvent::Data(burst.len()))
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            match byte {
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();

                    let (bursts, delay) = {
                        let mut state = self.lock();
                        let is_command = state.phase == Phase::LoggedIn && !line.is_empty();
                        let bursts = state.handle_line(&line);
                        let delay = if is_command {
                            state.command_delay
                        } else {
                            Duration::ZERO
                        };
                        (bursts, delay)
                    };
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    debug!("Mock console answered {:?} with {} bursts", line, bursts.len());
                    self.output.extend(bursts);
                }
                b'\n' | 0 => {}
                other => self.line.push(other),
            }
        }
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
    }
}
