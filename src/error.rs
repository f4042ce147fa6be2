//! Error taxonomy for the bus, the sensor driver, the acquisition cycle,
//! reading validation and probe calibration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::acquisition::CycleState;
use crate::calibrator::Phase;
use crate::validate::Field;

/// Transport-level failures. All of them are fatal to the session that hit them.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus endpoint could not be opened.
    #[error("bus endpoint {} is unavailable", path.display())]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The control operation binding a target address was rejected.
    #[error("binding target address 0x{address:02x} failed")]
    AddressBindFailed {
        address: u16,
        #[source]
        source: io::Error,
    },
    /// A transaction was attempted before any target address was bound.
    #[error("no target address bound on the bus handle")]
    NotBound,
    /// The handle was already closed.
    #[error("bus handle is closed")]
    Closed,
    /// Register select or data read came back short.
    #[error("read of {expected} byte(s) at register 0x{register:02x} transferred {actual}")]
    IoReadFailed {
        register: u8,
        expected: usize,
        actual: usize,
        #[source]
        source: Option<io::Error>,
    },
    /// Fewer than register byte + payload were written.
    #[error("write of {expected} byte(s) at register 0x{register:02x} transferred {actual}")]
    IoWriteFailed {
        register: u8,
        expected: usize,
        actual: usize,
        #[source]
        source: Option<io::Error>,
    },
}

/// Errors raised by the BME680 driver.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The chip-id register did not identify a BME680.
    #[error("unexpected chip id 0x{0:02x} (expected 0x61)")]
    UnknownChip(u8),
    /// Heater duration cannot be encoded (limit is 4032 ms).
    #[error("heater duration of {0} ms exceeds the 4032 ms limit")]
    InvalidWaitTime(u32),
}

/// Errors surfaced by an acquisition session.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The session could not open or address the bus.
    #[error("could not open the sensor bus")]
    Bus(#[source] BusError),
    /// Applying the sensor configuration failed; the cycle is in `Fault`.
    #[error("sensor configuration failed")]
    Configuration(#[source] SensorError),
    /// A transport error interrupted a running cycle; the cycle is in `Fault`.
    #[error("acquisition failed while {state}")]
    AcquisitionFailed {
        state: CycleState,
        #[source]
        source: BusError,
    },
    /// The attempt budget ran out before enough stable readings were taken.
    #[error("only {acquired} of {target} stable readings acquired")]
    PartialAcquisition { acquired: u32, target: u32 },
    /// The cycle already faulted and cannot continue.
    #[error("acquisition cycle is faulted")]
    Faulted,
}

/// A decoded reading failed a plausibility check.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} reading {value} is out of range")]
    OutOfRangeReading { field: Field, value: f64 },
}

/// Errors raised while calibrating the soil probe.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The digital output collaborator refused to change level.
    #[error("digital output failed: {0:?}")]
    Output(embedded_hal::digital::ErrorKind),
    /// The ADC kept flagging its result as stale.
    #[error("conversion still not ready after {polls} polls")]
    ConversionNotReady { polls: u32 },
    /// A phase did not reach saturation within its poll ceiling.
    #[error("{phase} phase did not saturate after {polls} polls (last value {last})")]
    CalibrationTimeout { phase: Phase, polls: u32, last: u8 },
    /// Dry and wet thresholds coincide, so no moisture scale can be built.
    #[error("dry and wet thresholds are both {0}")]
    DegenerateThresholds(u8),
}
