//! The narrow capability a sensor driver is given.

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::bus::{BusHandle, RawBus, RawSample};
use crate::error::BusError;

/// Register read, register write and a millisecond delay. Nothing else.
///
/// Implementations do not interpret register contents.
pub trait SensorPort {
    /// Reads `length` bytes starting at `register`.
    fn read(&mut self, register: u8, length: usize) -> Result<RawSample, BusError>;

    /// Writes `payload` starting at `register`.
    fn write(&mut self, register: u8, payload: &[u8]) -> Result<(), BusError>;

    /// Blocks the calling thread for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

impl<T: SensorPort + ?Sized> SensorPort for &mut T {
    fn read(&mut self, register: u8, length: usize) -> Result<RawSample, BusError> {
        T::read(self, register, length)
    }

    fn write(&mut self, register: u8, payload: &[u8]) -> Result<(), BusError> {
        T::write(self, register, payload)
    }

    fn delay_ms(&mut self, ms: u32) {
        T::delay_ms(self, ms)
    }
}

/// [`SensorPort`] over a bound [`BusHandle`] and an `embedded-hal` delay.
pub struct BusPort<B: RawBus, D: DelayNs> {
    bus: BusHandle<B>,
    delay: D,
}

impl<B: RawBus, D: DelayNs> BusPort<B, D> {
    pub fn new(bus: BusHandle<B>, delay: D) -> Self {
        Self { bus, delay }
    }

    pub fn bus(&self) -> &BusHandle<B> {
        &self.bus
    }

    /// Rebinds the underlying handle to another target.
    pub fn bind_address(&mut self, address: u16) -> Result<(), BusError> {
        self.bus.bind_address(address)
    }

    /// Gives back the handle and the delay provider.
    pub fn release(self) -> (BusHandle<B>, D) {
        (self.bus, self.delay)
    }
}

impl<B: RawBus, D: DelayNs> SensorPort for BusPort<B, D> {
    fn read(&mut self, register: u8, length: usize) -> Result<RawSample, BusError> {
        self.bus.transact_read(register, length)
    }

    fn write(&mut self, register: u8, payload: &[u8]) -> Result<(), BusError> {
        self.bus.transact_write(register, payload)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

/// Thread-sleeping delay for hosted targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}
