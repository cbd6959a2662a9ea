//! The two open-drain signal lines of the bus.
//!
//! Both lines are pulled up externally. The controller can only ever let a line
//! float (and read it) or pull it low; a logic high is always the result of
//! releasing the line.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

/// One of the two physical bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Clock,
    Data,
}

/// Drive-mode control over the clock and data lines.
///
/// Implementations never fail: a disconnected or stuck line silently yields
/// wrong samples, which shows up later as missing acknowledgements.
pub trait LineDriver {
    /// Put the line in high impedance so the pull-up or the battery sets its level.
    fn release(&mut self, line: Line);

    /// Actively pull the line low.
    fn assert_low(&mut self, line: Line);

    /// Release the line and return its logic level (`true` = high).
    fn sample(&mut self, line: Line) -> bool;
}

impl<T: LineDriver + ?Sized> LineDriver for &mut T {
    fn release(&mut self, line: Line) {
        (**self).release(line)
    }

    fn assert_low(&mut self, line: Line) {
        (**self).assert_low(line)
    }

    fn sample(&mut self, line: Line) -> bool {
        (**self).sample(line)
    }
}

/// Microsecond-accurate delays on a general purpose OS.
///
/// Short waits spin on the monotonic clock because a thread sleep on Linux
/// overshoots by tens of microseconds, which is longer than a bit phase.
/// Waits above [`SpinDelay::SPIN_LIMIT`] are handed to the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl SpinDelay {
    pub const SPIN_LIMIT: Duration = Duration::from_micros(100);
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let wait = Duration::from_nanos(u64::from(ns));
        if wait >= Self::SPIN_LIMIT {
            std::thread::sleep(wait);
            return;
        }
        let start = Instant::now();
        while start.elapsed() < wait {
            std::hint::spin_loop();
        }
    }
}

#[test]
fn test_spin_delay_waits_at_least_requested() {
    let start = Instant::now();
    SpinDelay.delay_us(50);
    assert!(start.elapsed() >= Duration::from_micros(50));

    let start = Instant::now();
    SpinDelay.delay_us(500);
    assert!(start.elapsed() >= Duration::from_micros(500));
}
