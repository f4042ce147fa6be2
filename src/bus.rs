//! Byte-level bus transport.
//!
//! A [`BusHandle`] owns one open bus endpoint and at most one bound target
//! address. Every transaction is blocking and is never retried here; retry
//! policy belongs to the acquisition cycle and its caller.

use std::io;
use std::ops::Deref;

use log::{debug, trace};

use crate::error::BusError;

/// Highest 7-bit target address.
const MAX_ADDRESS: u16 = 0x7F;

/// Raw device underneath a [`BusHandle`].
///
/// `write` and `read` report how many bytes actually moved so the handle can
/// detect short transfers.
pub trait RawBus {
    /// Points all following transfers at `address`.
    fn set_address(&mut self, address: u16) -> io::Result<()>;

    /// Writes `bytes`, returning the number of bytes transferred.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Reads into `buf`, returning the number of bytes transferred.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Bytes read from a register range. Decoded immediately by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    register: u8,
    bytes: Vec<u8>,
}

impl RawSample {
    pub fn new(register: u8, bytes: Vec<u8>) -> Self {
        Self { register, bytes }
    }

    /// First register of the range.
    pub fn register(&self) -> u8 {
        self.register
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for RawSample {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Exclusively owned, scoped bus endpoint.
///
/// The endpoint is released by [`BusHandle::close`] or, on every other exit
/// path, when the handle is dropped.
#[derive(Debug)]
pub struct BusHandle<B: RawBus> {
    bus: Option<B>,
    address: Option<u16>,
}

impl<B: RawBus> BusHandle<B> {
    /// Wraps an already opened device.
    pub fn new(bus: B) -> Self {
        Self {
            bus: Some(bus),
            address: None,
        }
    }

    /// The currently bound target address, if any.
    pub fn address(&self) -> Option<u16> {
        self.address
    }

    pub fn is_open(&self) -> bool {
        self.bus.is_some()
    }

    /// Binds `address` for all subsequent transactions, replacing any previous binding.
    pub fn bind_address(&mut self, address: u16) -> Result<(), BusError> {
        let bus = self.bus.as_mut().ok_or(BusError::Closed)?;
        if address > MAX_ADDRESS {
            return Err(BusError::AddressBindFailed {
                address,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a 7-bit address"),
            });
        }

        // A failed rebind leaves no address bound rather than a stale one.
        self.address = None;
        bus.set_address(address)
            .map_err(|source| BusError::AddressBindFailed { address, source })?;
        self.address = Some(address);

        debug!("bus bound to 0x{:02x}", address);
        Ok(())
    }

    /// Selects `register` and reads `length` bytes from it.
    pub fn transact_read(&mut self, register: u8, length: usize) -> Result<RawSample, BusError> {
        let bus = self.bound()?;

        let selected = bus
            .write(&[register])
            .map_err(|e| read_failed(register, length, 0, e))?;
        if selected != 1 {
            return Err(BusError::IoReadFailed {
                register,
                expected: length,
                actual: 0,
                source: None,
            });
        }

        let mut bytes = vec![0u8; length];
        let actual = bus
            .read(&mut bytes)
            .map_err(|e| read_failed(register, length, 0, e))?;
        trace!("read 0x{:02x}: {}/{} bytes", register, actual, length);
        if actual != length {
            return Err(BusError::IoReadFailed {
                register,
                expected: length,
                actual,
                source: None,
            });
        }

        Ok(RawSample::new(register, bytes))
    }

    /// Writes `register` followed by `payload` in one transfer.
    pub fn transact_write(&mut self, register: u8, payload: &[u8]) -> Result<(), BusError> {
        let bus = self.bound()?;

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.push(register);
        frame.extend_from_slice(payload);

        let expected = frame.len();
        let actual = bus.write(&frame).map_err(|source| BusError::IoWriteFailed {
            register,
            expected,
            actual: 0,
            source: Some(source),
        })?;
        trace!("write 0x{:02x}: {}/{} bytes", register, actual, expected);
        if actual != expected {
            return Err(BusError::IoWriteFailed {
                register,
                expected,
                actual,
                source: None,
            });
        }

        Ok(())
    }

    /// Releases the endpoint. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.bus.take().is_some() {
            debug!("bus handle closed");
        }
        self.address = None;
    }

    fn bound(&mut self) -> Result<&mut B, BusError> {
        let bus = self.bus.as_mut().ok_or(BusError::Closed)?;
        if self.address.is_none() {
            return Err(BusError::NotBound);
        }
        Ok(bus)
    }
}

impl<B: RawBus> Drop for BusHandle<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_failed(register: u8, expected: usize, actual: usize, source: io::Error) -> BusError {
    BusError::IoReadFailed {
        register,
        expected,
        actual,
        source: Some(source),
    }
}
