//! wedgebmc-hardware
//!
//! Console access crate: the serial driver, device sessions, the login
//! automator and the command channel that runs shell commands on the BMC,
//! plus the fan, thermal and PSU façade built on top of it. The CLI uses
//! this crate to talk to the BMC.
//!
//! Public API:
//! - `channel::BmcClient` / `channel::ShellChannel` - serialized command execution
//! - `platform::Platform` - fans, thermals and PSUs over one shared channel
//! - `serial_driver::SerialDriver` - opens the real console device
//! - `mock::MockBmc` - simulated console for tests and `--mock`

pub mod cache;
pub mod channel;
pub mod command;
pub mod decoder;
pub mod fan;
pub mod login;
pub mod mock;
pub mod platform;
pub mod psu;
pub mod reader;
pub mod serial_driver;
pub mod session;
pub mod thermal;

pub use cache::TelemetryCache;
pub use channel::{BmcClient, ShellChannel};
pub use command::BmcCommand;
pub use fan::FanTrays;
pub use login::{LoginAutomator, LoginState};
pub use mock::MockBmc;
pub use platform::{Platform, PlatformSnapshot};
pub use psu::Psus;
pub use reader::StreamReader;
pub use serial_driver::{LinkOpener, SerialDriver, SerialLink};
pub use session::Session;
pub use thermal::Thermals;
