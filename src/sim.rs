//! A line-level smart battery used by the tests.
//!
//! The simulator watches every controller call on the two lines, tracks the
//! wired-AND level of each line and reacts to start, stop and clock edges the
//! way an SMBus target would: it shifts in bytes, acknowledges its own address
//! and shifts out register words after a repeated start.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::line::{Line, LineDriver};

pub(crate) const BATTERY_ADDRESS: u8 = 0x0b;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Release(Line),
    AssertLow(Line),
    Sample(Line),
}

/// Records requested delays instead of waiting.
#[derive(Debug, Default)]
pub(crate) struct NoDelay {
    total: Duration,
}

impl NoDelay {
    pub fn total(&self) -> Duration {
        self.total
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total += Duration::from_nanos(u64::from(ns));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Receive,
    Transmit,
    Ignore,
}

#[derive(Debug)]
struct State {
    registers: HashMap<u8, u16>,

    clock_low: bool,
    data_low: bool,
    target_data_low: bool,

    mode: Mode,
    after_start: bool,
    in_transaction: bool,
    falls: u8,
    shift: u8,
    frame: Vec<u8>,
    pointer: Option<u8>,
    out: [u8; 2],
    out_index: usize,
    silent: bool,
    last_controller_ack: bool,

    silent_reads: usize,
    nack_transactions: usize,

    events: Vec<Event>,
    received: Vec<u8>,
    transmitted: Vec<u8>,
    controller_acks: Vec<bool>,
    reads: HashMap<u8, usize>,
    starts: usize,
    stops: usize,
    samples: usize,
}

impl State {
    fn new() -> Self {
        Self {
            registers: HashMap::new(),
            clock_low: false,
            data_low: false,
            target_data_low: false,
            mode: Mode::Idle,
            after_start: false,
            in_transaction: false,
            falls: 0,
            shift: 0,
            frame: Vec::new(),
            pointer: None,
            out: [0; 2],
            out_index: 0,
            silent: false,
            last_controller_ack: false,
            silent_reads: 0,
            nack_transactions: 0,
            events: Vec::new(),
            received: Vec::new(),
            transmitted: Vec::new(),
            controller_acks: Vec::new(),
            reads: HashMap::new(),
            starts: 0,
            stops: 0,
            samples: 0,
        }
    }

    fn clock_level(&self) -> bool {
        !self.clock_low
    }

    fn data_level(&self) -> bool {
        !(self.data_low || self.target_data_low)
    }

    fn set(&mut self, line: Line, low: bool) {
        let clock_before = self.clock_level();
        let data_before = self.data_level();
        match line {
            Line::Clock => self.clock_low = low,
            Line::Data => self.data_low = low,
        }
        let clock_after = self.clock_level();
        let data_after = self.data_level();

        if clock_before && clock_after && data_before != data_after {
            if data_after {
                self.on_stop();
            } else {
                self.on_start();
            }
        } else if !clock_before && clock_after {
            self.on_rise();
        } else if clock_before && !clock_after {
            self.on_fall();
        }
    }

    fn on_start(&mut self) {
        self.starts += 1;
        if !self.in_transaction {
            self.in_transaction = true;
            if self.nack_transactions > 0 {
                self.nack_transactions -= 1;
                self.mode = Mode::Ignore;
                return;
            }
        } else if self.mode == Mode::Ignore && self.frame.is_empty() {
            // still inside a refused transaction
            return;
        }
        self.mode = Mode::Receive;
        self.after_start = true;
        self.falls = 0;
        self.shift = 0;
        self.frame.clear();
        self.target_data_low = false;
    }

    fn on_stop(&mut self) {
        self.stops += 1;
        if self.frame.len() == 4 && self.frame[0] == BATTERY_ADDRESS << 1 {
            let value = u16::from_le_bytes([self.frame[2], self.frame[3]]);
            self.registers.insert(self.frame[1], value);
        }
        self.mode = Mode::Idle;
        self.in_transaction = false;
        self.target_data_low = false;
        self.frame.clear();
    }

    fn on_rise(&mut self) {
        match self.mode {
            Mode::Receive if self.falls < 8 => {
                self.shift = (self.shift << 1) | u8::from(self.data_level());
            }
            Mode::Transmit if self.falls == 8 => {
                self.last_controller_ack = !self.data_level();
                self.controller_acks.push(self.last_controller_ack);
            }
            _ => {}
        }
    }

    fn on_fall(&mut self) {
        if self.after_start {
            self.after_start = false;
            return;
        }
        match self.mode {
            Mode::Receive => self.receive_fall(),
            Mode::Transmit => self.transmit_fall(),
            Mode::Idle | Mode::Ignore => {}
        }
    }

    fn receive_fall(&mut self) {
        self.falls += 1;
        if self.falls == 8 {
            let byte = self.shift;
            self.received.push(byte);
            if self.frame.is_empty() && byte >> 1 != BATTERY_ADDRESS {
                self.mode = Mode::Ignore;
                return;
            }
            self.target_data_low = true;
        } else if self.falls == 9 {
            self.target_data_low = false;
            let byte = self.shift;
            self.frame.push(byte);
            self.falls = 0;
            self.shift = 0;
            if self.frame.len() == 2 && self.frame[0] & 1 == 0 {
                self.pointer = Some(self.frame[1]);
            }
            if self.frame.len() == 1 && byte & 1 == 1 {
                self.begin_transmit();
            }
        }
    }

    fn begin_transmit(&mut self) {
        let command = self.pointer.unwrap_or(0);
        *self.reads.entry(command).or_default() += 1;
        let word = self.registers.get(&command).copied().unwrap_or(0);
        self.out = word.to_le_bytes();
        self.out_index = 0;
        self.silent = if self.silent_reads > 0 {
            self.silent_reads -= 1;
            true
        } else {
            false
        };
        self.mode = Mode::Transmit;
        self.falls = 0;
        self.present();
    }

    fn present(&mut self) {
        let bit = 7 - self.falls;
        let one = self.out[self.out_index] & (1 << bit) != 0;
        self.target_data_low = !self.silent && !one;
    }

    fn transmit_fall(&mut self) {
        self.falls += 1;
        if self.falls < 8 {
            self.present();
        } else if self.falls == 8 {
            self.target_data_low = false;
            if !self.silent {
                self.transmitted.push(self.out[self.out_index]);
            }
        } else if self.last_controller_ack && self.out_index + 1 < self.out.len() {
            self.out_index += 1;
            self.falls = 0;
            self.present();
        } else {
            self.mode = Mode::Ignore;
        }
    }
}

/// Cloneable handle; clones observe and script the same battery.
#[derive(Debug, Clone)]
pub(crate) struct SimBattery {
    state: Rc<RefCell<State>>,
}

impl SimBattery {
    pub fn new() -> Self {
        Self { state: Rc::new(RefCell::new(State::new())) }
    }

    pub fn set_register(&mut self, command: u8, value: u16) {
        self.state.borrow_mut().registers.insert(command, value);
    }

    pub fn register(&self, command: u8) -> Option<u16> {
        self.state.borrow().registers.get(&command).copied()
    }

    /// The next `n` reads are acknowledged but the battery never drives data.
    pub fn silence_next_reads(&mut self, n: usize) {
        self.state.borrow_mut().silent_reads = n;
    }

    /// The next `n` transactions are ignored entirely.
    pub fn nack_next_transactions(&mut self, n: usize) {
        self.state.borrow_mut().nack_transactions = n;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Every byte shifted in from the controller, addresses included.
    pub fn received(&self) -> Vec<u8> {
        self.state.borrow().received.clone()
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.state.borrow().transmitted.clone()
    }

    /// The controller's answer after each transmitted byte (`true` = ACK).
    pub fn controller_acks(&self) -> Vec<bool> {
        self.state.borrow().controller_acks.clone()
    }

    /// Number of word reads served for `command`.
    pub fn reads_of(&self, command: u8) -> usize {
        self.state.borrow().reads.get(&command).copied().unwrap_or(0)
    }

    pub fn starts(&self) -> usize {
        self.state.borrow().starts
    }

    pub fn stops(&self) -> usize {
        self.state.borrow().stops
    }

    /// Data samples taken by the controller while the battery was transmitting.
    pub fn samples(&self) -> usize {
        self.state.borrow().samples
    }
}

impl LineDriver for SimBattery {
    fn release(&mut self, line: Line) {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Release(line));
        state.set(line, false);
    }

    fn assert_low(&mut self, line: Line) {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::AssertLow(line));
        state.set(line, true);
    }

    fn sample(&mut self, line: Line) -> bool {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Sample(line));
        state.set(line, false);
        if line == Line::Data && state.mode == Mode::Transmit && state.falls < 8 {
            state.samples += 1;
        }
        match line {
            Line::Clock => state.clock_level(),
            Line::Data => state.data_level(),
        }
    }
}
