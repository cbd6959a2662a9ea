//! The battery protection loop.
//!
//! Every period the monitor reads the status word and, while the pack is
//! discharging, the state of charge. Low-charge actions require both the new
//! sample and the previous accepted one to be under a bound, so one corrupted
//! reading cannot shut the host down. An over-temperature alarm has to be
//! reported on several consecutive cycles before it does.

use std::fmt;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, Instant};

use crate::battery::{Reading, SmartBattery};
use crate::host::Host;
use crate::line::LineDriver;
use crate::sink::TelemetrySink;
use crate::status::BatteryStatus;

/// Acts when `soc <= soc` now and `previous <= previous` on the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Threshold {
    pub soc: u16,
    pub previous: u16,
}

impl Threshold {
    fn holds(&self, soc: u16, previous: u16) -> bool {
        soc <= self.soc && previous <= self.previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    pub shutdown: Threshold,
    pub blink: Threshold,
    pub warning: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            shutdown: Threshold { soc: 8, previous: 10 },
            blink: Threshold { soc: 10, previous: 12 },
            warning: Threshold { soc: 15, previous: 17 },
        }
    }
}

impl Thresholds {
    /// The first rule that holds, checked from the most severe.
    pub fn classify(&self, soc: u16, previous: u16) -> SocAction {
        if self.shutdown.holds(soc, previous) {
            SocAction::Shutdown
        } else if self.blink.holds(soc, previous) {
            SocAction::BlinkDisplay
        } else if self.warning.holds(soc, previous) {
            SocAction::LowWarning
        } else {
            SocAction::Heartbeat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocAction {
    Shutdown,
    /// Toggle the display off and on, then leave the LED on
    BlinkDisplay,
    /// LED on, briefly interrupted
    LowWarning,
    /// LED briefly on
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    OverTemperature { consecutive: u8 },
    LowCharge { soc: u16, previous: u16 },
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::OverTemperature { consecutive } => {
                write!(f, "over temperature on {consecutive} consecutive reads")
            }
            ShutdownReason::LowCharge { soc, previous } => {
                write!(f, "state of charge {soc}% (previously {previous}%)")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Shutdown(ShutdownReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusVerdict {
    /// The status word could not be read; skip this cycle's decisions
    Bad,
    OverTemperature,
    Good(BatteryStatus),
}

/// What the monitor remembers between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    /// Last accepted state of charge
    pub previous_soc: u16,
    pub consecutive_overtemp_count: u8,
}

impl Default for MonitorState {
    fn default() -> Self {
        // mid scale, so the first low reading alone never acts
        Self { previous_soc: 50, consecutive_overtemp_count: 0 }
    }
}

impl MonitorState {
    /// Feed a status reading to the over-temperature debounce. A bad reading
    /// leaves the count untouched.
    pub fn observe_status(&mut self, status: &Reading<BatteryStatus>, limit: u8) -> StatusVerdict {
        if !status.good {
            return StatusVerdict::Bad;
        }
        if status.value.over_temperature() {
            self.consecutive_overtemp_count = self.consecutive_overtemp_count.saturating_add(1);
            if self.consecutive_overtemp_count >= limit {
                return StatusVerdict::OverTemperature;
            }
        } else {
            self.consecutive_overtemp_count = 0;
        }
        StatusVerdict::Good(status.value)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub period: Duration,
    /// Send the vendor enable-charging write at the start of every cycle
    pub enable_charging_sequence: bool,
    pub overtemp_limit: u8,
    pub thresholds: Thresholds,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            enable_charging_sequence: false,
            overtemp_limit: 4,
            thresholds: Thresholds::default(),
        }
    }
}

const PRESS: Duration = Duration::from_millis(250);
const DISPLAY_OFF_TIME: Duration = Duration::from_secs(2);
const LED_PULSE: Duration = Duration::from_secs(1);
const FULL_BLINK: Duration = Duration::from_millis(250);
const CHARGING_BLINK: Duration = Duration::from_millis(333);

pub struct Monitor<L, D, H, S> {
    battery: SmartBattery<L, D>,
    host: H,
    sink: S,
    settings: MonitorSettings,
    state: MonitorState,
}

impl<L, D, H, S> Monitor<L, D, H, S>
where
    L: LineDriver,
    D: DelayNs,
    H: Host,
    S: TelemetrySink,
{
    pub fn new(battery: SmartBattery<L, D>, host: H, sink: S, settings: MonitorSettings) -> Self {
        Self { battery, host, sink, settings, state: MonitorState::default() }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Put the outputs in a known state and make sure the display is on.
    pub async fn start(&mut self) {
        self.host.set_indicator(false);
        self.host.set_charger_enabled(true);
        self.host.press_display_power(false);
        sleep(Duration::from_secs(1)).await;
        if !self.host.display_is_on() {
            info!("Display is off, turning it on");
            self.press_display_power().await;
        }
    }

    /// Run cycles every period until a shutdown is triggered.
    pub async fn run(mut self) -> ShutdownReason {
        self.start().await;
        loop {
            let started = Instant::now();
            if let Outcome::Shutdown(reason) = self.cycle().await {
                return reason;
            }
            sleep_until(started + self.settings.period).await;
        }
    }

    /// One monitoring cycle. Shutdown is performed before this returns
    /// [`Outcome::Shutdown`].
    pub async fn cycle(&mut self) -> Outcome {
        if self.settings.enable_charging_sequence && !self.battery.enable_charging().is_ack() {
            debug!("MONITOR: enable-charging write not acknowledged");
        }

        let status = self.battery.status();
        let status = match self.state.observe_status(&status, self.settings.overtemp_limit) {
            StatusVerdict::Bad => {
                warn!("MONITOR: no valid status from the battery");
                self.host.set_indicator(true);
                self.sink.publish_fault(true);
                return Outcome::Continue;
            }
            StatusVerdict::OverTemperature => {
                let consecutive = self.state.consecutive_overtemp_count;
                return self.shutdown(ShutdownReason::OverTemperature { consecutive });
            }
            StatusVerdict::Good(status) => status,
        };
        debug!("MONITOR: status {status:?}");
        if status.over_temperature() {
            warn!(
                "MONITOR: over temperature ({} of {})",
                self.state.consecutive_overtemp_count, self.settings.overtemp_limit
            );
        }

        if status.discharging() {
            self.on_battery().await
        } else {
            self.on_charger(status).await;
            Outcome::Continue
        }
    }

    async fn on_battery(&mut self) -> Outcome {
        self.host.set_charger_enabled(true);

        let Some(soc) = self.battery.state_of_charge().ok() else {
            self.sink.publish_fault(true);
            return Outcome::Continue;
        };
        let previous = self.state.previous_soc;
        self.sink.publish_fault(false);
        self.sink.publish_percent(soc.min(100) as u8);

        match self.settings.thresholds.classify(soc, previous) {
            SocAction::Shutdown => {
                return self.shutdown(ShutdownReason::LowCharge { soc, previous });
            }
            SocAction::BlinkDisplay => {
                warn!("MONITOR: battery at {soc}%");
                self.press_display_power().await;
                sleep(DISPLAY_OFF_TIME).await;
                self.press_display_power().await;
                self.host.set_indicator(true);
            }
            SocAction::LowWarning => {
                info!("MONITOR: battery low at {soc}%");
                self.host.set_indicator(false);
                sleep(LED_PULSE).await;
                self.host.set_indicator(true);
            }
            SocAction::Heartbeat => {
                self.host.set_indicator(true);
                sleep(LED_PULSE).await;
                self.host.set_indicator(false);
            }
        }

        self.state.previous_soc = soc;
        Outcome::Continue
    }

    async fn on_charger(&mut self, status: BatteryStatus) {
        self.sink.publish_fault(false);
        if status.fully_charged() {
            self.host.set_charger_enabled(false);
            self.blink(3, FULL_BLINK).await;
        } else {
            self.host.set_charger_enabled(true);
            self.blink(2, CHARGING_BLINK).await;
        }
    }

    async fn press_display_power(&mut self) {
        self.host.press_display_power(true);
        sleep(PRESS).await;
        self.host.press_display_power(false);
    }

    async fn blink(&mut self, times: usize, half_period: Duration) {
        for i in 0..times {
            self.host.set_indicator(true);
            sleep(half_period).await;
            self.host.set_indicator(false);
            if i + 1 < times {
                sleep(half_period).await;
            }
        }
    }

    fn shutdown(&mut self, reason: ShutdownReason) -> Outcome {
        warn!("MONITOR: shutting down: {reason}");
        if let Err(err) = self.host.shutdown() {
            error!("MONITOR: {err}");
        }
        Outcome::Shutdown(reason)
    }
}
