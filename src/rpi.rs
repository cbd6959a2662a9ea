//! Raspberry Pi GPIO backend.
//!
//! The BCM GPIO block has no open-drain mode. A line is released by switching
//! the pin to input and pulled low by switching it to output with the output
//! latch at 0.

use rppal::gpio::{Gpio, InputPin, IoPin, Mode, OutputPin};

use crate::config::Config;
use crate::error::HardwareError;
use crate::host::{run_shutdown_command, Host};
use crate::line::{Line, LineDriver};

pub struct RpiLines {
    clock: IoPin,
    data: IoPin,
}

impl RpiLines {
    fn pin(&mut self, line: Line) -> &mut IoPin {
        match line {
            Line::Clock => &mut self.clock,
            Line::Data => &mut self.data,
        }
    }
}

impl LineDriver for RpiLines {
    fn release(&mut self, line: Line) {
        self.pin(line).set_mode(Mode::Input);
    }

    fn assert_low(&mut self, line: Line) {
        let pin = self.pin(line);
        pin.set_low();
        pin.set_mode(Mode::Output);
    }

    fn sample(&mut self, line: Line) -> bool {
        let pin = self.pin(line);
        pin.set_mode(Mode::Input);
        pin.is_high()
    }
}

pub struct RpiHost {
    indicator: OutputPin,
    charge_disable: OutputPin,
    display_power: IoPin,
    display_status: InputPin,
    shutdown_command: Vec<String>,
}

impl Host for RpiHost {
    fn set_indicator(&mut self, on: bool) {
        if on {
            self.indicator.set_high();
        } else {
            self.indicator.set_low();
        }
    }

    fn set_charger_enabled(&mut self, enabled: bool) {
        if enabled {
            self.charge_disable.set_low();
        } else {
            self.charge_disable.set_high();
        }
    }

    fn press_display_power(&mut self, pressed: bool) {
        if pressed {
            self.display_power.set_low();
            self.display_power.set_mode(Mode::Output);
        } else {
            self.display_power.set_mode(Mode::Input);
        }
    }

    fn display_is_on(&mut self) -> bool {
        self.display_status.is_high()
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        run_shutdown_command(&self.shutdown_command)
    }
}

/// Claim every pin named in `config`. Bus lines start released.
pub fn open(config: &Config) -> Result<(RpiLines, RpiHost), HardwareError> {
    let gpio = Gpio::new()?;
    let lines = RpiLines {
        clock: gpio.get(config.bus.clock_pin)?.into_io(Mode::Input),
        data: gpio.get(config.bus.data_pin)?.into_io(Mode::Input),
    };
    let host = RpiHost {
        indicator: gpio.get(config.host.indicator_pin)?.into_output_low(),
        charge_disable: gpio.get(config.host.charge_disable_pin)?.into_output_low(),
        display_power: gpio.get(config.host.display_power_pin)?.into_io(Mode::Input),
        display_status: gpio.get(config.host.display_status_pin)?.into_input(),
        shutdown_command: config.monitor.shutdown_command.clone(),
    };
    log::debug!(
        "GPIO ready: clock {}, data {}",
        config.bus.clock_pin,
        config.bus.data_pin
    );
    Ok((lines, host))
}
