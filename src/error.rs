use crate::registers::Register;

/// A configuration or register table that cannot drive the bus safely.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Register table entry {index} is {found:?}, out of order")]
    TableOrder { index: usize, found: Register },

    #[error("Register {0:?} has unsupported length {1} (only words are read)")]
    UnsupportedLength(Register, u8),

    #[error("Register {0:?} has an empty plausible range")]
    EmptyRange(Register),

    #[error("Register {0:?} reuses command 0x{1:02X}")]
    DuplicateCommand(Register, u8),

    #[error("GPIO {0} is assigned to more than one signal")]
    PinReused(u8),

    #[error("Quarter period must be 1..=1000 us, got {0}")]
    QuarterPeriod(u64),

    #[error("Battery address 0x{0:02X} is not a 7-bit address")]
    Address(u8),

    #[error("Monitor period must be at least one second")]
    Period,

    #[error("Thresholds must not tighten from {narrower} to {wider}")]
    ThresholdOrder { narrower: &'static str, wider: &'static str },

    #[error("Overtemperature limit must be at least 1")]
    OvertempLimit,

    #[error("Shutdown command is empty")]
    EmptyShutdownCommand,
}

/// Failures of the host side: GPIO access, scheduling and the shutdown command.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Failed to raise scheduling priority: {0}")]
    Priority(#[source] std::io::Error),

    #[error("Shutdown command failed: {0}")]
    Shutdown(#[source] std::io::Error),
}
