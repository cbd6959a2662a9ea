use std::fmt;

use serde::Serialize;

use crate::registers::Register;
use crate::status::BatteryStatus;

/// The reported state of the battery
#[derive(Debug, Serialize)]
pub struct BatteryState {
    pub status: BatteryStatus,
    /// The pack voltage in V
    pub voltage_v: f32,
    /// The pack current in mA, negative while discharging
    pub current_ma: i16,
    /// The pack temperature in degrees C
    pub temperature_c: f32,
    /// The relative state of charge in %
    pub state_of_charge_pct: u16,
    /// Average time to empty in minutes. Absent while the pack is charging
    pub time_to_empty_min: Option<u16>,
    /// Average time to full in minutes. Absent without a charger or when full
    pub time_to_full_min: Option<u16>,
    /// Registers whose value was still implausible after the retry
    pub suspect: Vec<Register>,
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Voltage = {:6.3} Volts", self.voltage_v)?;
        writeln!(f, "Current = {} mA", self.current_ma)?;
        writeln!(f, "Temperature = {:5.2} degrees C", self.temperature_c)?;
        writeln!(f, "State of Charge = {} percent", self.state_of_charge_pct)?;
        if let Some(minutes) = self.time_to_empty_min {
            writeln!(f, "Time to empty = {minutes} minutes")?;
        }
        if let Some(minutes) = self.time_to_full_min {
            writeln!(f, "Time to full = {minutes} minutes")?;
        }
        writeln!(f, "Battery Status = {:#06x} Hex", self.status.0)?;
        for flag in self.status.flags() {
            writeln!(f, "   {flag}")?;
        }
        for register in &self.suspect {
            writeln!(f, "   ({register:?} out of range)")?;
        }
        Ok(())
    }
}

#[test]
fn test_report_lines() {
    let state = BatteryState {
        status: BatteryStatus(0x00c0),
        voltage_v: 11.42,
        current_ma: -812,
        temperature_c: 27.35,
        state_of_charge_pct: 64,
        time_to_empty_min: Some(95),
        time_to_full_min: None,
        suspect: vec![],
    };
    let report = state.to_string();
    assert_eq!(
        report.lines().collect::<Vec<_>>(),
        vec![
            "Voltage = 11.420 Volts",
            "Current = -812 mA",
            "Temperature = 27.35 degrees C",
            "State of Charge = 64 percent",
            "Time to empty = 95 minutes",
            "Battery Status = 0x00c0 Hex",
            "   Initialized",
            "   Discharging",
        ]
    );
}
