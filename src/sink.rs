//! Where the monitor publishes what it learned each cycle.
//!
//! A display (for instance a state-of-charge glyph in a panel) only needs the
//! last percent value and whether the battery has stopped answering.

use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    /// Last accepted state of charge, 0..=100
    pub percent: Option<u8>,
    /// The battery failed a read and its retry
    pub fault: bool,
}

pub trait TelemetrySink {
    fn publish_percent(&mut self, percent: u8);
    fn publish_fault(&mut self, fault: bool);
}

impl TelemetrySink for watch::Sender<Telemetry> {
    fn publish_percent(&mut self, percent: u8) {
        self.send_modify(|telemetry| telemetry.percent = Some(percent));
    }

    fn publish_fault(&mut self, fault: bool) {
        self.send_if_modified(|telemetry| {
            let changed = telemetry.fault != fault;
            telemetry.fault = fault;
            changed
        });
    }
}

/// Logs changes instead of forwarding them.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Telemetry,
}

impl TelemetrySink for LogSink {
    fn publish_percent(&mut self, percent: u8) {
        if self.last.percent != Some(percent) {
            info!("State of Charge = {percent} percent");
        }
        self.last.percent = Some(percent);
    }

    fn publish_fault(&mut self, fault: bool) {
        if fault && !self.last.fault {
            warn!("The battery did not respond");
        } else if !fault && self.last.fault {
            info!("The battery is responding again");
        }
        self.last.fault = fault;
    }
}

#[test]
fn test_watch_sink_keeps_last_percent_across_faults() {
    let (mut tx, rx) = watch::channel(Telemetry::default());
    tx.publish_percent(73);
    tx.publish_fault(true);
    assert_eq!(*rx.borrow(), Telemetry { percent: Some(73), fault: true });
    tx.publish_fault(false);
    tx.publish_percent(72);
    assert_eq!(*rx.borrow(), Telemetry { percent: Some(72), fault: false });
}
