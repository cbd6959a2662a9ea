use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::battery::DEFAULT_ADDRESS;
use crate::error::ConfigError;
use crate::monitor::{MonitorSettings, Threshold, Thresholds};

/// Everything the monitor can be told from its TOML file. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub monitor: MonitorConfig,
    pub host: HostConfig,
}

/// The software bus. Pins are BCM GPIO numbers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    pub clock_pin: u8,
    pub data_pin: u8,
    /// One quarter of the bit period in microseconds
    pub quarter_period_us: u64,
    pub address: u8,
    /// SCHED_FIFO priority requested at startup, if any
    pub realtime_priority: Option<i32>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            clock_pin: 3,
            data_pin: 2,
            quarter_period_us: 10,
            address: DEFAULT_ADDRESS,
            realtime_priority: Some(99),
        }
    }
}

impl BusConfig {
    pub fn quarter_period(&self) -> Duration {
        Duration::from_micros(self.quarter_period_us)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub period_secs: u64,
    pub enable_charging_sequence: bool,
    /// Consecutive over-temperature reads before shutdown
    pub overtemp_limit: u8,
    pub thresholds: Thresholds,
    pub shutdown_command: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period_secs: 30,
            enable_charging_sequence: false,
            overtemp_limit: 4,
            thresholds: Thresholds::default(),
            shutdown_command: ["sudo", "shutdown", "-h", "now"].map(String::from).to_vec(),
        }
    }
}

impl MonitorConfig {
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            period: Duration::from_secs(self.period_secs),
            enable_charging_sequence: self.enable_charging_sequence,
            overtemp_limit: self.overtemp_limit,
            thresholds: self.thresholds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Open-drain output wired across the display's power button
    pub display_power_pin: u8,
    pub indicator_pin: u8,
    /// High disables the charger
    pub charge_disable_pin: u8,
    /// High while the display is powered
    pub display_status_pin: u8,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            display_power_pin: 4,
            indicator_pin: 17,
            charge_disable_pin: 19,
            display_status_pin: 22,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = [
            self.bus.clock_pin,
            self.bus.data_pin,
            self.host.display_power_pin,
            self.host.indicator_pin,
            self.host.charge_disable_pin,
            self.host.display_status_pin,
        ];
        let mut seen = HashSet::new();
        if let Some(pin) = pins.into_iter().find(|pin| !seen.insert(*pin)) {
            return Err(ConfigError::PinReused(pin));
        }

        if !(1..=1000).contains(&self.bus.quarter_period_us) {
            return Err(ConfigError::QuarterPeriod(self.bus.quarter_period_us));
        }
        if self.bus.address > 0x7f {
            return Err(ConfigError::Address(self.bus.address));
        }

        let monitor = &self.monitor;
        if monitor.period_secs == 0 {
            return Err(ConfigError::Period);
        }
        if monitor.overtemp_limit == 0 {
            return Err(ConfigError::OvertempLimit);
        }
        if monitor.shutdown_command.is_empty() {
            return Err(ConfigError::EmptyShutdownCommand);
        }

        let t = &monitor.thresholds;
        let looser = |narrower: &Threshold, wider: &Threshold| {
            narrower.soc <= wider.soc && narrower.previous <= wider.previous
        };
        if !looser(&t.shutdown, &t.blink) {
            return Err(ConfigError::ThresholdOrder { narrower: "shutdown", wider: "blink" });
        }
        if !looser(&t.blink, &t.warning) {
            return Err(ConfigError::ThresholdOrder { narrower: "blink", wider: "warning" });
        }
        Ok(())
    }
}

/// Load and parse the configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
