//! Outputs of the host device the monitor acts on.

use std::process::Command;

use log::info;

use crate::error::HardwareError;

pub trait Host {
    /// The status LED.
    fn set_indicator(&mut self, on: bool);

    /// Enable or disable the battery charger.
    fn set_charger_enabled(&mut self, enabled: bool);

    /// Hold (`true`) or release the display's power button. A press toggles
    /// the display.
    fn press_display_power(&mut self, pressed: bool);

    fn display_is_on(&mut self) -> bool;

    /// Power the host off. Fire and forget: the process is not expected to
    /// keep monitoring afterwards.
    fn shutdown(&mut self) -> Result<(), HardwareError>;
}

/// Run the configured shutdown command, e.g. `sudo shutdown -h now`.
pub fn run_shutdown_command(command: &[String]) -> Result<(), HardwareError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| HardwareError::Shutdown(std::io::Error::other("empty shutdown command")))?;

    info!("Running {}", command.join(" "));
    let status = Command::new(program).args(args).status().map_err(HardwareError::Shutdown)?;
    if !status.success() {
        return Err(HardwareError::Shutdown(std::io::Error::other(format!(
            "{program} exited with {status}"
        ))));
    }
    Ok(())
}

#[test]
fn test_shutdown_command_reports_failure() {
    assert!(run_shutdown_command(&[]).is_err());
    assert!(run_shutdown_command(&["true".to_string()]).is_ok());
    assert!(run_shutdown_command(&["false".to_string()]).is_err());
}
