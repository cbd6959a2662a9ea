//! Software-timed SMBus controller.
//!
//! Every bit is produced by switching the two lines between released and
//! asserted-low with fixed delays. All delays are multiples of one quarter bit
//! period `T`. The sequences below include long settle times after each byte
//! because the battery holds the clock low for a while after acknowledging and
//! clock stretching is not monitored.

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::line::{Line, LineDriver};

/// The acknowledge bit returned by the receiver of a byte.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The receiver pulled data low during the ninth clock
    Ack,
    /// Data stayed high: the receiver is absent or refused the byte
    Nack,
}

impl Ack {
    fn from_level(high: bool) -> Self {
        if high {
            Ack::Nack
        } else {
            Ack::Ack
        }
    }

    pub fn is_ack(self) -> bool {
        self == Ack::Ack
    }

    /// Combine two acknowledgements of the same transaction.
    pub fn and(self, other: Ack) -> Ack {
        if self.is_ack() && other.is_ack() {
            Ack::Ack
        } else {
            Ack::Nack
        }
    }
}

/// The outcome of one complete read transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// The word as sampled, low byte first
    pub raw: u16,
    /// Whether every byte the controller sent was acknowledged
    pub acked: bool,
}

/// A two-wire bus controller driven entirely through a [`LineDriver`].
pub struct SoftBus<L, D> {
    lines: L,
    delay: D,
    quarter_ns: u32,
}

impl<L: LineDriver, D: DelayNs> SoftBus<L, D> {
    /// Settle time before each start condition, in quarter periods.
    const START_SETTLE: u32 = 100;
    /// Hold after the acknowledge bit of a sent byte.
    const SEND_SETTLE: u32 = 90;
    /// Settle after the controller acknowledges the low byte of a word.
    const LOW_BYTE_SETTLE: u32 = 40;
    /// Settle after the controller's final no-acknowledge.
    const HIGH_BYTE_SETTLE: u32 = 8;
    const STOP_SETTLE: u32 = 30;

    /// Take ownership of the lines and put the bus in the idle state.
    pub fn new(lines: L, delay: D, quarter_period: Duration) -> Self {
        let quarter_ns = u32::try_from(quarter_period.as_nanos()).unwrap_or(u32::MAX);
        let mut bus = Self { lines, delay, quarter_ns };
        bus.lines.release(Line::Clock);
        bus.lines.release(Line::Data);
        bus.wait(20);
        bus
    }

    pub fn into_inner(self) -> (L, D) {
        (self.lines, self.delay)
    }

    fn wait(&mut self, quarters: u32) {
        self.delay.delay_ns(self.quarter_ns.saturating_mul(quarters));
    }

    fn drive(&mut self, line: Line, high: bool) {
        if high {
            self.lines.release(line);
        } else {
            self.lines.assert_low(line);
        }
    }

    /// One clock pulse: high for 2T, then low for T.
    fn pulse_clock(&mut self) {
        self.lines.release(Line::Clock);
        self.wait(2);
        self.lines.assert_low(Line::Clock);
        self.wait(1);
    }

    /// Start condition: data falls while the clock is high.
    ///
    /// Must only be issued from idle, i.e. after a stop or on a fresh bus.
    pub fn start(&mut self) {
        self.lines.release(Line::Clock);
        self.lines.release(Line::Data);
        self.wait(Self::START_SETTLE);
        self.lines.assert_low(Line::Data);
        self.wait(1);
        self.lines.assert_low(Line::Clock);
        self.wait(4);
    }

    /// Start condition without a preceding stop, used to turn a write phase
    /// into a read phase within one transaction.
    pub fn repeated_start(&mut self) {
        self.lines.release(Line::Data);
        self.wait(8);
        self.lines.release(Line::Clock);
        self.wait(2);
        self.lines.assert_low(Line::Data);
        self.wait(2);
        self.lines.assert_low(Line::Clock);
        self.wait(16);
    }

    /// Stop condition: data rises while the clock is high.
    pub fn stop(&mut self) {
        self.lines.release(Line::Clock);
        self.wait(1);
        self.lines.release(Line::Data);
        self.wait(Self::STOP_SETTLE);
    }

    /// Shift out one byte MSB first and sample the receiver's acknowledge.
    pub fn send_byte(&mut self, value: u8) -> Ack {
        for bit in (0..8).rev() {
            self.drive(Line::Data, value & (1 << bit) != 0);
            self.wait(1);
            self.pulse_clock();
        }

        self.wait(4);
        self.lines.release(Line::Data);
        self.wait(1);
        self.lines.release(Line::Clock);
        let ack = Ack::from_level(self.lines.sample(Line::Data));
        self.wait(2);
        self.lines.assert_low(Line::Clock);
        self.lines.assert_low(Line::Data);
        self.wait(Self::SEND_SETTLE);
        ack
    }

    /// Shift in one byte MSB first. The level is sampled while the clock is
    /// low, after the receiver has had a full phase to present the bit.
    fn read_byte(&mut self) -> u8 {
        let mut value = 0u8;
        for _ in 0..8 {
            self.lines.release(Line::Data);
            self.wait(1);
            value = (value << 1) | u8::from(self.lines.sample(Line::Data));
            self.pulse_clock();
        }
        value
    }

    /// Send the controller's acknowledge bit (`Ack` asks for another byte).
    fn answer(&mut self, ack: Ack, settle: u32) {
        self.wait(2);
        self.drive(Line::Data, !ack.is_ack());
        self.wait(1);
        self.lines.release(Line::Clock);
        self.wait(2);
        self.lines.assert_low(Line::Clock);
        self.lines.assert_low(Line::Data);
        self.wait(settle);
    }

    /// Read a 16-bit word, low byte first.
    pub fn read_word(&mut self) -> u16 {
        let low = self.read_byte();
        self.answer(Ack::Ack, Self::LOW_BYTE_SETTLE);
        let high = self.read_byte();
        self.answer(Ack::Nack, Self::HIGH_BYTE_SETTLE);
        u16::from(low) | (u16::from(high) << 8)
    }

    /// SMBus "read word": pointer write, repeated start, word read, stop.
    pub fn read_word_data(&mut self, address: u8, command: u8) -> Transfer {
        self.start();
        let mut ack = self.send_byte(address << 1);
        ack = ack.and(self.send_byte(command));
        self.repeated_start();
        ack = ack.and(self.send_byte((address << 1) | 1));
        let raw = self.read_word();
        self.stop();

        trace!(
            "SMBUS: RX 0x{address:02x}:0x{command:02x} = 0x{} {ack:?}",
            hex::encode(raw.to_le_bytes())
        );
        Transfer { raw, acked: ack.is_ack() }
    }

    /// SMBus "write word": command then low and high byte, no repeated start.
    pub fn write_word_data(&mut self, address: u8, command: u8, value: u16) -> Ack {
        let [low, high] = value.to_le_bytes();
        self.start();
        let ack = self
            .send_byte(address << 1)
            .and(self.send_byte(command))
            .and(self.send_byte(low))
            .and(self.send_byte(high));
        self.stop();

        trace!(
            "SMBUS: TX 0x{address:02x}:0x{command:02x} = 0x{} {ack:?}",
            hex::encode([low, high])
        );
        ack
    }
}
