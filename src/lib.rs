//! # Environmental rig acquisition core
//!
//! Samples a Bosch BME680 (temperature, pressure, humidity, gas) and a
//! capacitive soil probe behind an MCP342x ADC over a byte-oriented bus.
//!
//! The layers, leaves first:
//!
//! ```text
//! RawBus ─► BusHandle ─► SensorPort ─► Bme680 ─► AcquisitionCycle ─► ReadingValidator
//!                                   └─► Mcp342x ─► ThresholdCalibrator ─► soil
//! ```
//!
//! - [`bus`]: scoped, exclusively owned bus endpoint with byte-count checks.
//! - [`port`]: `read` / `write` / `delay_ms` capability handed to drivers.
//! - [`driver`]: typestate BME680 driver. It cannot be measured before it is
//!   initialized and configured.
//! - [`acquisition`]: forced-mode state machine with a bounded attempt budget.
//! - [`validate`]: plausibility bands and air-quality classification.
//! - [`calibrator`]: charge/discharge threshold discovery for the soil probe.
//! - [`session`]: the two entry points, [`run_acquisition_session`] and
//!   [`run_calibration`].
//!
//! ## Units
//! The driver computes in fixed point, as the sensor's compensation formulas do:
//! - **Temperature**: centi-degrees (2350 = 23.50 °C)
//! - **Humidity**: milli-percent (45123 = 45.123 %)
//! - **Pressure**: Pascal (101325 = 1013.25 hPa)
//! - **Gas resistance**: Ohms
//!
//! [`PhysicalReading`] carries the same values as floating point in °C, hPa and %.

pub mod acquisition;
pub mod bus;
mod calc;
pub mod calibrator;
pub mod driver;
pub mod error;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod port;
pub mod reading;
pub mod session;
pub mod settings;
pub mod sink;
pub mod soil;
pub mod validate;

#[cfg(test)]
mod test_support {
    use crate::bus::RawSample;
    use crate::error::BusError;
    use crate::port::SensorPort;

    /// Reads zeros and accepts every write.
    pub(crate) struct NullPort;

    impl SensorPort for NullPort {
        fn read(&mut self, register: u8, length: usize) -> Result<RawSample, BusError> {
            Ok(RawSample::new(register, vec![0; length]))
        }

        fn write(&mut self, _register: u8, _payload: &[u8]) -> Result<(), BusError> {
            Ok(())
        }

        fn delay_ms(&mut self, _ms: u32) {}
    }
}

pub use acquisition::{Acquisition, AcquisitionBudget, AcquisitionCycle, Completion, CycleState};
pub use bus::{BusHandle, RawBus, RawSample};
pub use calibrator::{CalibrationResult, Mcp342x, ProbeAdc, ThresholdCalibrator};
pub use driver::{Bme680, Ready, Uninitialized};
pub use error::{AcquisitionError, BusError, CalibrationError, SensorError, ValidationError};
pub use port::{BusPort, SensorPort, StdDelay};
pub use reading::PhysicalReading;
pub use session::{
    run_acquisition_session, run_calibration, run_calibration_series, CalibrationOptions,
    SessionOptions,
};
pub use settings::{Config, ConfigBuilder, GasProfile, GasProfileIndex, IIRFilter, Oversampling};
pub use sink::{ConsoleSink, ReadingRecord, ReadingSink};
pub use soil::{SoilClassifier, SoilCondition};
pub use validate::{AirQualityBucket, ClassifiedReading, ReadingValidator};

/// Whole degrees Celsius, used for heater targets and ambient estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Celsius(pub i32);

/// Duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Milliseconds(pub u32);

/// Temperature in centi-degrees Celsius (2350 = 23.50 °C).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Temperature(pub i32);

impl Temperature {
    pub fn celsius(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

/// Relative humidity in milli-percent (45123 = 45.123 %).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Humidity(pub i32);

impl Humidity {
    pub fn percent(&self) -> f64 {
        f64::from(self.0) / 1000.0
    }
}

/// Atmospheric pressure in Pascal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Pressure(pub u32);

impl Pressure {
    /// 1 hPa = 100 Pa.
    pub fn hpa(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

/// Gas resistance in Ohms. Higher means fewer VOCs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Gas(pub u32);

/// Compensated measurement in fixed-point units.
///
/// A skipped channel (or disabled gas conversion) reads as zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Measurement {
    pub temp: Temperature,
    pub hum: Humidity,
    pub pres: Pressure,
    pub gas: Gas,
}
