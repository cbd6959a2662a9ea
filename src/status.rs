use core::fmt;
use core::fmt::Formatter;

use serde::Serialize;

/// The Smart Battery `BatteryStatus()` word.
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatteryStatus(pub u16);

impl BatteryStatus {
    pub const OVER_CHARGED_ALARM: u16 = 0x8000;
    pub const TERMINATE_CHARGE_ALARM: u16 = 0x4000;
    pub const OVER_TEMP_ALARM: u16 = 0x1000;
    pub const TERMINATE_DISCHARGE_ALARM: u16 = 0x0800;
    pub const REMAINING_CAPACITY_ALARM: u16 = 0x0200;
    pub const REMAINING_TIME_ALARM: u16 = 0x0100;
    pub const INITIALIZED: u16 = 0x0080;
    pub const DISCHARGING: u16 = 0x0040;
    pub const FULLY_CHARGED: u16 = 0x0020;
    pub const FULLY_DISCHARGED: u16 = 0x0010;
    const ERROR_CODE: u16 = 0x000f;

    const NAMES: [(u16, &'static str); 10] = [
        (Self::OVER_CHARGED_ALARM, "OVERCHARGE ALARM"),
        (Self::TERMINATE_CHARGE_ALARM, "TERMINATE CHARGE ALARM"),
        (Self::OVER_TEMP_ALARM, "OVER TEMP ALARM"),
        (Self::TERMINATE_DISCHARGE_ALARM, "TERMINATE DISCHARGE ALARM"),
        (Self::REMAINING_CAPACITY_ALARM, "REMAINING CAPACITY ALARM"),
        (Self::REMAINING_TIME_ALARM, "REMAINING TIME ALARM"),
        (Self::INITIALIZED, "Initialized"),
        (Self::DISCHARGING, "Discharging"),
        (Self::FULLY_CHARGED, "Fully Charged"),
        (Self::FULLY_DISCHARGED, "Fully Discharged"),
    ];

    fn is_set(&self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    pub fn over_temperature(&self) -> bool {
        self.is_set(Self::OVER_TEMP_ALARM)
    }

    pub fn discharging(&self) -> bool {
        self.is_set(Self::DISCHARGING)
    }

    pub fn fully_charged(&self) -> bool {
        self.is_set(Self::FULLY_CHARGED)
    }

    pub fn fully_discharged(&self) -> bool {
        self.is_set(Self::FULLY_DISCHARGED)
    }

    /// The SBS error code of the last command (0 = OK).
    pub fn error_code(&self) -> u8 {
        (self.0 & Self::ERROR_CODE) as u8
    }

    /// Names of the flags that are set, highest bit first.
    pub fn flags(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::NAMES
            .iter()
            .filter(|(mask, _)| self.is_set(*mask))
            .map(|(_, name)| *name)
    }
}

impl fmt::Debug for BatteryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} (", self.0)?;
        for (i, name) in self.flags().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}")?;
        }
        if self.error_code() != 0 {
            write!(f, "; error code {}", self.error_code())?;
        }
        write!(f, ")")
    }
}

#[test]
fn test_status_flags() {
    let status = BatteryStatus(0x10c0);
    assert!(status.over_temperature());
    assert!(status.discharging());
    assert!(!status.fully_charged());
    assert!(!status.fully_discharged());
    assert!(BatteryStatus(0x08d0).fully_discharged());
    assert_eq!(
        status.flags().collect::<Vec<_>>(),
        vec!["OVER TEMP ALARM", "Initialized", "Discharging"]
    );
    assert_eq!(format!("{status:?}"), "0x10c0 (OVER TEMP ALARM, Initialized, Discharging)");
}

#[test]
fn test_status_error_code() {
    let status = BatteryStatus(0x00a3);
    assert!(status.fully_charged());
    assert_eq!(status.error_code(), 3);
    assert_eq!(format!("{status:?}"), "0x00a3 (Initialized, Fully Charged; error code 3)");
}
