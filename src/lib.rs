//! Read Smart Battery telemetry over a bit-banged SMBus and protect the pack
//!
//! Written for a Raspberry Pi powering a display from a smart battery pack. The battery sits on
//! two GPIO lines that are driven open-drain in software, so no I2C controller is needed and any
//! pair of pins can be used.
//!
//! On top of the bus the crate provides:
//!
//! - Word reads and writes of the standard Smart Battery registers, with a single retry of
//!   corrupted transfers
//! - Decoded status flags, voltage (V), current (mA), temperature (°C) and state of charge (%)
//! - A monitor loop that blinks a status LED, switches the charger and shuts the host down on low
//!   charge or sustained over-temperature
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "rpi")]
//! # fn main() -> anyhow::Result<()> {
//! use batmon::{Config, SmartBattery, SoftBus, SpinDelay};
//!
//! let config = Config::default();
//! let (lines, _host) = batmon::rpi::open(&config)?;
//! let bus = SoftBus::new(lines, SpinDelay, config.bus.quarter_period());
//! let mut battery = SmartBattery::new(bus, config.bus.address);
//! if let Some(state) = battery.snapshot() {
//!     println!("{state}");
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rpi"))]
//! # fn main() {}
//! ```

mod battery;
mod battery_state;
mod bus;
mod config;
mod error;
mod host;
mod line;
mod monitor;
mod registers;
mod sched;
mod sink;
mod status;

#[cfg(feature = "rpi")]
pub mod rpi;

#[cfg(test)]
mod sim;

pub use battery::{retry_once, RawRead, Reading, SmartBattery, DEFAULT_ADDRESS};
pub use battery_state::BatteryState;
pub use bus::{Ack, SoftBus, Transfer};
pub use config::{load_config, BusConfig, Config, HostConfig, MonitorConfig};
pub use error::{ConfigError, HardwareError};
pub use host::{run_shutdown_command, Host};
pub use line::{Line, LineDriver, SpinDelay};
pub use monitor::{
    Monitor, MonitorSettings, MonitorState, Outcome, ShutdownReason, SocAction, StatusVerdict,
    Threshold, Thresholds,
};
pub use registers::{validate_table, Conversion, Plausible, Register, RegisterSpec, REGISTERS};
pub use sched::raise_priority;
pub use sink::{LogSink, Telemetry, TelemetrySink};
pub use status::BatteryStatus;
