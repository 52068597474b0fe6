//! Login automator
//!
//! Drives the console from an unknown state to an authenticated root prompt:
//!
//! ```text
//! Start --wakeup--> AwaitPrompt --prompt--> Authenticated
//!                       |
//!                    "login:" --username--> AwaitPasswordPrompt
//!                                               |
//!                                          "Password:" --password--> AwaitShellPrompt
//!                                                                        |
//!                                                                     prompt --> Authenticated
//! ```
//!
//! Any other outcome ends the attempt. After `login_attempts` failed attempts
//! the automator settles in `Failed`.

use std::io;
use std::thread;
use tracing::{debug, warn};
use wedgebmc_core::{LoginConfig, TimingConfig};

use crate::command::{keystrokes, WAKEUP};
use crate::reader::{contains, StreamReader};
use crate::serial_driver::SerialLink;

/// Login progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    AwaitPrompt,
    AwaitPasswordPrompt,
    AwaitShellPrompt,
    Authenticated,
    Failed,
}

impl LoginState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginState::Authenticated | LoginState::Failed)
    }
}

/// Bounded login state machine over one session
pub struct LoginAutomator<'a> {
    login: &'a LoginConfig,
    timing: &'a TimingConfig,
    reader: &'a StreamReader,
}

impl<'a> LoginAutomator<'a> {
    pub fn new(login: &'a LoginConfig, timing: &'a TimingConfig, reader: &'a StreamReader) -> Self {
        Self {
            login,
            timing,
            reader,
        }
    }

    /// Returns true once the console shows the prompt. Never panics or errors.
    pub fn authenticate<L: SerialLink + ?Sized>(&self, link: &mut L) -> bool {
        self.run(link) == LoginState::Authenticated
    }

    /// Run attempts until a terminal state is reached.
    pub fn run<L: SerialLink + ?Sized>(&self, link: &mut L) -> LoginState {
        let attempts = self.timing.login_attempts.max(1);

        for attempt in 1..=attempts {
            let mut state = LoginState::Start;

            while !state.is_terminal() {
                state = match self.step(link, state) {
                    Ok(Some(next)) => next,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Console write failed during login: {}", e);
                        return LoginState::Failed;
                    }
                };
            }

            if state == LoginState::Authenticated {
                debug!("Console authenticated on attempt {}", attempt);
                return state;
            }

            debug!(
                "Login attempt {}/{} stopped in {:?}",
                attempt, attempts, state
            );
            if attempt < attempts {
                thread::sleep(self.timing.login_retry_pause());
            }
        }

        LoginState::Failed
    }

    /// Advance one state. `Ok(None)` ends the current attempt.
    fn step<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        state: LoginState,
    ) -> io::Result<Option<LoginState>> {
        let prompt = self.login.prompt.as_bytes();

        let next = match state {
            LoginState::Start => {
                // One CR only; a second one produces a trailing prompt that a
                // later command would take for its own response.
                link.write_all(WAKEUP)?;
                Some(LoginState::AwaitPrompt)
            }
            LoginState::AwaitPrompt => {
                let banner = self.login.login_marker.as_bytes();
                let buf =
                    self.reader
                        .read_until_any(link, &[prompt, banner], self.timing.prompt_wait());
                if contains(&buf, prompt) {
                    Some(LoginState::Authenticated)
                } else if contains(&buf, self.login.login_marker.as_bytes()) {
                    debug!("Login banner seen, sending username");
                    link.write_all(&keystrokes(&self.login.username))?;
                    Some(LoginState::AwaitPasswordPrompt)
                } else {
                    None
                }
            }
            LoginState::AwaitPasswordPrompt => {
                let marker = self.login.password_marker.as_bytes();
                let buf = self
                    .reader
                    .read_until(link, marker, self.timing.login_step_wait());
                if contains(&buf, marker) {
                    link.write_all(&keystrokes(&self.login.password))?;
                    Some(LoginState::AwaitShellPrompt)
                } else {
                    None
                }
            }
            LoginState::AwaitShellPrompt => {
                let buf = self
                    .reader
                    .read_until(link, prompt, self.timing.login_step_wait());
                if contains(&buf, prompt) {
                    Some(LoginState::Authenticated)
                } else {
                    None
                }
            }
            LoginState::Authenticated | LoginState::Failed => Some(state),
        };

        Ok(next)
    }
}
