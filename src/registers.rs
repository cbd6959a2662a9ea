//! Smart Battery Data register table.
//!
//! Each register the monitor knows about is described once: its command code,
//! its length on the wire, how the raw word converts to engineering units and
//! which converted values are believable. Anything outside the plausible range
//! is treated as a corrupted transfer and read again.

use serde::Serialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Register {
    ManufacturerAccess,
    Temperature,
    Voltage,
    Current,
    AverageCurrent,
    RelativeStateOfCharge,
    AbsoluteStateOfCharge,
    RemainingCapacity,
    FullChargeCapacity,
    RunTimeToEmpty,
    AverageTimeToEmpty,
    AverageTimeToFull,
    BatteryStatus,
    CycleCount,
    DesignCapacity,
    DesignVoltage,
}

/// How a raw word turns into a value in [`RegisterSpec::unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Unsigned,
    Signed,
    /// Milli-units to units
    Milli,
    /// 0.1 K to degrees Celsius
    DeciKelvinToCelsius,
}

impl Conversion {
    pub fn apply(self, raw: u16) -> f64 {
        match self {
            Conversion::Unsigned => f64::from(raw),
            Conversion::Signed => f64::from(raw as i16),
            Conversion::Milli => f64::from(raw) / 1000.0,
            Conversion::DeciKelvinToCelsius => f64::from(raw) / 10.0 - 273.15,
        }
    }
}

/// Believable values of a register. Both bounds are exclusive and apply to
/// the converted value; `reject` lists raw sentinels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plausible {
    pub above: Option<f64>,
    pub below: Option<f64>,
    pub reject: &'static [u16],
}

impl Plausible {
    const ANY: Plausible = Plausible { above: None, below: None, reject: &[] };
    const NOT_ALL_ONES: Plausible = Plausible { above: None, below: None, reject: &[0xffff] };

    const fn below(limit: f64) -> Self {
        Plausible { above: None, below: Some(limit), reject: &[] }
    }

    const fn between(above: f64, below: f64) -> Self {
        Plausible { above: Some(above), below: Some(below), reject: &[] }
    }

    fn is_empty(&self) -> bool {
        matches!((self.above, self.below), (Some(a), Some(b)) if a >= b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSpec {
    pub register: Register,
    pub command: u8,
    /// Bytes on the wire
    pub length: u8,
    pub unit: &'static str,
    pub conversion: Conversion,
    pub plausible: Plausible,
}

impl RegisterSpec {
    pub fn convert(&self, raw: u16) -> f64 {
        self.conversion.apply(raw)
    }

    pub fn is_plausible(&self, raw: u16) -> bool {
        if self.plausible.reject.contains(&raw) {
            return false;
        }
        let value = self.convert(raw);
        self.plausible.above.map_or(true, |limit| value > limit)
            && self.plausible.below.map_or(true, |limit| value < limit)
    }
}

const fn word(
    register: Register,
    command: u8,
    unit: &'static str,
    conversion: Conversion,
    plausible: Plausible,
) -> RegisterSpec {
    RegisterSpec { register, command, length: 2, unit, conversion, plausible }
}

const CURRENT_RANGE: Plausible =
    Plausible { above: Some(-3000.0), below: Some(3000.0), reject: &[0xffff] };
const PACK_VOLTAGE_RANGE: Plausible = Plausible::between(6.0, 22.0);
const PERCENT_RANGE: Plausible = Plausible::below(150.0);
const MINUTES_RANGE: Plausible = Plausible::below(1001.0);

/// Indexed by `Register as usize`; [`validate_table`] checks the order.
pub const REGISTERS: [RegisterSpec; 16] = [
    word(Register::ManufacturerAccess, 0x00, "", Conversion::Unsigned, Plausible::ANY),
    word(
        Register::Temperature,
        0x08,
        "°C",
        Conversion::DeciKelvinToCelsius,
        Plausible::below(40.0),
    ),
    word(Register::Voltage, 0x09, "V", Conversion::Milli, PACK_VOLTAGE_RANGE),
    word(Register::Current, 0x0a, "mA", Conversion::Signed, CURRENT_RANGE),
    word(Register::AverageCurrent, 0x0b, "mA", Conversion::Signed, CURRENT_RANGE),
    word(Register::RelativeStateOfCharge, 0x0d, "%", Conversion::Unsigned, PERCENT_RANGE),
    word(Register::AbsoluteStateOfCharge, 0x0e, "%", Conversion::Unsigned, PERCENT_RANGE),
    word(Register::RemainingCapacity, 0x0f, "mAh", Conversion::Unsigned, Plausible::NOT_ALL_ONES),
    word(Register::FullChargeCapacity, 0x10, "mAh", Conversion::Unsigned, Plausible::NOT_ALL_ONES),
    word(Register::RunTimeToEmpty, 0x11, "min", Conversion::Unsigned, MINUTES_RANGE),
    word(Register::AverageTimeToEmpty, 0x12, "min", Conversion::Unsigned, MINUTES_RANGE),
    // zero minutes to full is what a full pack on the charger reports
    word(
        Register::AverageTimeToFull,
        0x13,
        "min",
        Conversion::Unsigned,
        Plausible { above: None, below: Some(1001.0), reject: &[0] },
    ),
    word(Register::BatteryStatus, 0x16, "", Conversion::Unsigned, Plausible::NOT_ALL_ONES),
    word(Register::CycleCount, 0x17, "", Conversion::Unsigned, Plausible::NOT_ALL_ONES),
    word(Register::DesignCapacity, 0x18, "mAh", Conversion::Unsigned, Plausible::NOT_ALL_ONES),
    word(Register::DesignVoltage, 0x19, "V", Conversion::Milli, PACK_VOLTAGE_RANGE),
];

impl Register {
    pub fn spec(self) -> &'static RegisterSpec {
        &REGISTERS[self as usize]
    }

    pub fn command(self) -> u8 {
        self.spec().command
    }

    pub fn from_command(command: u8) -> Option<Register> {
        REGISTERS.iter().find(|spec| spec.command == command).map(|spec| spec.register)
    }
}

/// Check the register table once at startup.
pub fn validate_table() -> Result<(), ConfigError> {
    for (index, spec) in REGISTERS.iter().enumerate() {
        if spec.register as usize != index {
            return Err(ConfigError::TableOrder { index, found: spec.register });
        }
        if spec.length != 2 {
            return Err(ConfigError::UnsupportedLength(spec.register, spec.length));
        }
        if spec.plausible.is_empty() {
            return Err(ConfigError::EmptyRange(spec.register));
        }
        if REGISTERS[..index].iter().any(|other| other.command == spec.command) {
            return Err(ConfigError::DuplicateCommand(spec.register, spec.command));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        validate_table().unwrap();
    }

    #[test]
    fn test_state_of_charge_sentinel() {
        let soc = Register::RelativeStateOfCharge.spec();
        assert!(soc.is_plausible(0));
        assert!(soc.is_plausible(149));
        assert!(!soc.is_plausible(150));
        assert!(!soc.is_plausible(0xffff));
    }

    #[test]
    fn test_voltage_range_is_exclusive() {
        let voltage = Register::Voltage.spec();
        assert_eq!(voltage.convert(12_345), 12.345);
        assert!(voltage.is_plausible(12_345));
        assert!(!voltage.is_plausible(6_000));
        assert!(!voltage.is_plausible(22_000));
    }

    #[test]
    fn test_current_is_signed_and_rejects_all_ones() {
        let current = Register::Current.spec();
        assert_eq!(current.convert(0xfc18), -1000.0);
        assert!(current.is_plausible(0xfc18));
        assert!(!current.is_plausible(0xffff));
        assert!(!current.is_plausible(3000));
        assert!(!current.is_plausible((-3000i16) as u16));
    }

    #[test]
    fn test_temperature_converts_from_decikelvin() {
        let temperature = Register::Temperature.spec();
        assert!((temperature.convert(2982) - 25.05).abs() < 1e-9);
        assert!(temperature.is_plausible(2982));
        assert!(!temperature.is_plausible(3132));
    }

    #[test]
    fn test_time_to_full_rejects_zero_and_absent_charger() {
        let time_to_full = Register::AverageTimeToFull.spec();
        assert!(time_to_full.is_plausible(1000));
        assert!(!time_to_full.is_plausible(0));
        assert!(!time_to_full.is_plausible(0xffff));
        assert!(Register::AverageTimeToEmpty.spec().is_plausible(0));
    }

    #[test]
    fn test_lookup_by_command() {
        assert_eq!(Register::from_command(0x16), Some(Register::BatteryStatus));
        assert_eq!(Register::from_command(0x0d), Some(Register::RelativeStateOfCharge));
        assert_eq!(Register::from_command(0x3f), None);
        assert_eq!(Register::Temperature.command(), 0x08);
    }
}
