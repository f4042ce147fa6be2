//! Simulated devices shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use envrig::session::{BME680_ADDRESS, MCP342X_ADDRESS};
use envrig::{BusHandle, BusPort, RawBus};

/// Default-configuration measurement wait in milliseconds.
pub const MEASUREMENT_MS: u32 = 183;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A forced-mode measurement was started.
    Trigger,
    Wait(u32),
    Read { register: u8, length: usize },
    /// The device was released by its handle.
    Closed,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Heater-stability script of the simulated gas sensor.
pub enum Heater {
    AlwaysStable,
    NeverStable,
    /// One entry per measurement; stable once the script runs out.
    Pattern(VecDeque<bool>),
}

impl Heater {
    fn next(&mut self) -> bool {
        match self {
            Heater::AlwaysStable => true,
            Heater::NeverStable => false,
            Heater::Pattern(script) => script.pop_front().unwrap_or(true),
        }
    }
}

const FIELD_0: usize = 0x1D;
const CTRL_MEAS: usize = 0x74;

/// A BME680 register file with calibration coefficients chosen so that every
/// measurement compensates to 22.50 degC, 1013.25 hPa, 45.000 %rH and
/// 468719 Ohms.
pub struct SimulatedBme680 {
    regs: [u8; 256],
    pointer: usize,
    heater: Heater,
    measurements: u8,
    /// Bytes withheld from every field-block read.
    pub short_field_read: usize,
    log: EventLog,
}

impl SimulatedBme680 {
    pub fn new(heater: Heater, log: EventLog) -> Self {
        let mut regs = [0u8; 256];
        regs[0xD0] = 0x61;
        // par_t2 = 2048
        regs[0x8A] = 0x00;
        regs[0x8B] = 0x08;
        // par_p1 = 6250
        regs[0x8E] = 0x6A;
        regs[0x8F] = 0x18;
        // par_h2 = 1024
        regs[0xE1] = 0x40;
        regs[0xE2] = 0x00;

        Self {
            regs,
            pointer: 0,
            heater,
            measurements: 0,
            short_field_read: 0,
            log,
        }
    }

    fn measure(&mut self) {
        let stable = self.heater.next();
        let block: [u8; 15] = [
            0x80,
            self.measurements,
            0xE7,
            0x43,
            0x30,
            0xE1,
            0x00,
            0x00,
            0x2D,
            0x00,
            0,
            0,
            0,
            0x96,
            if stable { 0x34 } else { 0x24 },
        ];
        self.regs[FIELD_0..FIELD_0 + block.len()].copy_from_slice(&block);
        self.measurements = self.measurements.wrapping_add(1);
        // Back to sleep once done.
        self.regs[CTRL_MEAS] &= !0b11;
        self.log.borrow_mut().push(Event::Trigger);
    }
}

impl RawBus for SimulatedBme680 {
    fn set_address(&mut self, address: u16) -> io::Result<()> {
        if address == BME680_ADDRESS {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no device at address"))
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.pointer = usize::from(bytes[0]);
        for (offset, value) in bytes[1..].iter().enumerate() {
            self.regs[self.pointer + offset] = *value;
        }
        if self.pointer == CTRL_MEAS && bytes.len() > 1 && bytes[1] & 0b11 == 0b01 {
            self.measure();
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.log.borrow_mut().push(Event::Read {
            register: self.pointer as u8,
            length: buf.len(),
        });
        let n = if self.pointer == FIELD_0 {
            buf.len().saturating_sub(self.short_field_read)
        } else {
            buf.len()
        };
        buf[..n].copy_from_slice(&self.regs[self.pointer..self.pointer + n]);
        Ok(n)
    }
}

impl Drop for SimulatedBme680 {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Event::Closed);
    }
}

/// MCP342x that returns scripted 12-bit codes, one per started conversion.
pub struct SimulatedMcp342x {
    codes: VecDeque<i16>,
    current: i16,
    config: u8,
    pub conversions: usize,
    /// Keep the not-ready flag set on every result.
    pub busy: bool,
}

impl SimulatedMcp342x {
    pub fn new(codes: impl IntoIterator<Item = i16>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            current: 0,
            config: 0,
            conversions: 0,
            busy: false,
        }
    }
}

impl RawBus for SimulatedMcp342x {
    fn set_address(&mut self, address: u16) -> io::Result<()> {
        if address == MCP342X_ADDRESS {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no device at address"))
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let config = bytes[0];
        self.config = config & 0x7F;
        if config & 0x80 != 0 {
            self.current = self.codes.pop_front().unwrap_or(self.current);
            self.conversions += 1;
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let [msb, lsb] = self.current.to_be_bytes();
        let status = if self.busy { self.config | 0x80 } else { self.config };
        let reply = [msb, lsb, status];
        let n = buf.len().min(reply.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }
}

/// Delay provider that records every wait instead of sleeping.
pub struct RecordingDelay {
    log: EventLog,
}

impl RecordingDelay {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::Wait(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::Wait(ms));
    }
}

/// A port bound to `address` on `device`.
pub fn port<B: RawBus>(device: B, address: u16, log: &EventLog) -> BusPort<B, RecordingDelay> {
    let mut bus = BusHandle::new(device);
    bus.bind_address(address).expect("simulated device accepts its address");
    BusPort::new(bus, RecordingDelay::new(log.clone()))
}
