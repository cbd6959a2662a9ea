//! Scheduling requirements of the software bus.
//!
//! The bus has no clock of its own: every bit phase is a busy wait of a few
//! microseconds. If the kernel preempts the process during a transfer the
//! battery sees a stretched bit and the word comes back corrupted. Running the
//! process under the real-time FIFO policy makes that rare; it cannot rule it
//! out, which is why register reads are retried.

use crate::error::HardwareError;

/// Request `SCHED_FIFO` at `priority` (1..=99) for the calling process.
#[cfg(target_os = "linux")]
pub fn raise_priority(priority: i32) -> Result<(), HardwareError> {
    // SAFETY: sched_param is plain data, all-zero is a valid value. pid 0
    // addresses the calling process.
    let rc = unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        libc::sched_setscheduler(0, libc::SCHED_FIFO, &param)
    };
    if rc != 0 {
        return Err(HardwareError::Priority(std::io::Error::last_os_error()));
    }
    log::debug!("Running with SCHED_FIFO priority {priority}");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn raise_priority(_priority: i32) -> Result<(), HardwareError> {
    Err(HardwareError::Priority(std::io::Error::from(std::io::ErrorKind::Unsupported)))
}

#[cfg(all(test, target_os = "linux"))]
#[test]
fn test_out_of_range_priority_is_rejected() {
    assert!(matches!(raise_priority(1000), Err(HardwareError::Priority(_))));
}
