//! Register-level access to a Smart Battery over the software bus.
//!
//! Transfers are occasionally corrupted when the host scheduler preempts the
//! process in the middle of a bit, which typically shows up as an all-ones
//! word. Every named read therefore goes through [`retry_once`]: a transfer
//! that was not acknowledged, or whose value is outside the register's
//! plausible range, is repeated exactly once and the second result is taken
//! as it is.

use std::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::battery_state::BatteryState;
use crate::bus::{Ack, SoftBus, Transfer};
use crate::line::LineDriver;
use crate::registers::Register;
use crate::status::BatteryStatus;

/// 7-bit SMBus address every Smart Battery answers on.
pub const DEFAULT_ADDRESS: u8 = 0x0b;

/// A register value after the retry policy has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading<T> {
    pub value: T,
    pub raw: u16,
    /// 1, or 2 when the first transfer was rejected
    pub attempts: u8,
    /// The accepted transfer was acknowledged and plausible
    pub good: bool,
}

impl<T> Reading<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        Reading { value: f(self.value), raw: self.raw, attempts: self.attempts, good: self.good }
    }

    /// The value if it can be trusted.
    pub fn ok(self) -> Option<T> {
        self.good.then_some(self.value)
    }
}

/// Run `attempt`, and run it once more if the transfer was not acknowledged
/// or `plausible` rejects the word. The second transfer is never retried.
pub fn retry_once(
    mut attempt: impl FnMut() -> Transfer,
    plausible: impl Fn(u16) -> bool,
) -> Reading<u16> {
    let first = attempt();
    if first.acked && plausible(first.raw) {
        return Reading { value: first.raw, raw: first.raw, attempts: 1, good: true };
    }
    debug!("BATTERY: rejected 0x{:04x} (acked: {}), reading again", first.raw, first.acked);

    let second = attempt();
    let good = second.acked && plausible(second.raw);
    Reading { value: second.raw, raw: second.raw, attempts: 2, good }
}

/// An all-ones status means nobody drove the data line.
fn responded(status: &Reading<BatteryStatus>) -> bool {
    status.raw != 0xffff
}

/// One unretried read of any command code, printed by `batmon read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRead {
    pub command: u8,
    pub transfer: Transfer,
}

impl fmt::Display for RawRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.transfer.raw;
        match Register::from_command(self.command).map(Register::spec) {
            Some(spec) => write!(
                f,
                "{:?} (0x{:02x}) = 0x{raw:04x} ({raw}) = {} {}",
                spec.register,
                self.command,
                spec.convert(raw),
                spec.unit
            ),
            None => write!(f, "0x{:02x} = 0x{raw:04x} ({raw})", self.command),
        }?;
        if !self.transfer.acked {
            write!(f, " (not acknowledged)")?;
        }
        Ok(())
    }
}

pub struct SmartBattery<L, D> {
    bus: SoftBus<L, D>,
    address: u8,
}

impl<L: LineDriver, D: DelayNs> SmartBattery<L, D> {
    pub fn new(bus: SoftBus<L, D>, address: u8) -> Self {
        Self { bus, address }
    }

    /// One read transaction of any command code, without retry.
    pub fn read_raw(&mut self, command: u8) -> RawRead {
        RawRead { command, transfer: self.bus.read_word_data(self.address, command) }
    }

    pub fn write(&mut self, register: Register, value: u16) -> Ack {
        self.bus.write_word_data(self.address, register.command(), value)
    }

    /// Read a register through the retry policy, returning the raw word.
    pub fn read_word(&mut self, register: Register) -> Reading<u16> {
        let spec = register.spec();
        let address = self.address;
        let bus = &mut self.bus;
        let reading =
            retry_once(|| bus.read_word_data(address, spec.command), |raw| spec.is_plausible(raw));
        if !reading.good {
            warn!("BATTERY: {register:?} still bad after retry: 0x{:04x}", reading.raw);
        }
        reading
    }

    /// Read a register and convert it to its engineering unit.
    pub fn read(&mut self, register: Register) -> Reading<f64> {
        let spec = register.spec();
        self.read_word(register).map(|raw| spec.convert(raw))
    }

    pub fn status(&mut self) -> Reading<BatteryStatus> {
        self.read_word(Register::BatteryStatus).map(BatteryStatus)
    }

    /// Relative state of charge in percent.
    pub fn state_of_charge(&mut self) -> Reading<u16> {
        self.read_word(Register::RelativeStateOfCharge)
    }

    /// Pack voltage in volts.
    pub fn voltage(&mut self) -> Reading<f32> {
        self.read(Register::Voltage).map(|v| v as f32)
    }

    /// Current in mA, negative while discharging.
    pub fn current(&mut self) -> Reading<i16> {
        self.read_word(Register::Current).map(|raw| raw as i16)
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Reading<f32> {
        self.read(Register::Temperature).map(|t| t as f32)
    }

    pub fn average_time_to_empty(&mut self) -> Reading<u16> {
        self.read_word(Register::AverageTimeToEmpty)
    }

    pub fn average_time_to_full(&mut self) -> Reading<u16> {
        self.read_word(Register::AverageTimeToFull)
    }

    /// Vendor sequence some packs need before they accept charge: write
    /// 0x000A to `ManufacturerAccess()`. Packs without it ignore the write.
    pub fn enable_charging(&mut self) -> Ack {
        self.write(Register::ManufacturerAccess, 0x000a)
    }

    /// Read everything the one-shot report shows. `None` when the status
    /// word is still all ones after the retry.
    pub fn snapshot(&mut self) -> Option<BatteryState> {
        let status = self.status();
        if !responded(&status) {
            return None;
        }
        if !status.good {
            warn!("BATTERY: status {:?} was not acknowledged", status.value);
        }

        let mut suspect = Vec::new();
        let mut check = |register: Register, good: bool| {
            if !good {
                suspect.push(register);
            }
        };

        let voltage = self.voltage();
        check(Register::Voltage, voltage.good);
        let current = self.current();
        check(Register::Current, current.good);
        let temperature = self.temperature();
        check(Register::Temperature, temperature.good);
        let soc = self.state_of_charge();
        check(Register::RelativeStateOfCharge, soc.good);

        Some(BatteryState {
            status: status.value,
            voltage_v: voltage.value,
            current_ma: current.value,
            temperature_c: temperature.value,
            state_of_charge_pct: soc.value,
            time_to_empty_min: self.average_time_to_empty().ok(),
            time_to_full_min: self.average_time_to_full().ok(),
            suspect,
        })
    }
}
