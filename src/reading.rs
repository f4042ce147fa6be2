//! Decoded physical readings.

use crate::Measurement;

/// One accepted measurement in physical units. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Hectopascal.
    pub pressure: f64,
    /// Percent relative humidity.
    pub relative_humidity: f64,
    /// Ohms.
    pub gas_resistance: u32,
    pub heater_stable: bool,
}

impl PhysicalReading {
    pub fn new(
        temperature: f64,
        pressure: f64,
        relative_humidity: f64,
        gas_resistance: u32,
        heater_stable: bool,
    ) -> Self {
        Self {
            temperature,
            pressure,
            relative_humidity,
            gas_resistance,
            heater_stable,
        }
    }

    pub fn from_measurement(measurement: &Measurement, heater_stable: bool) -> Self {
        Self {
            temperature: measurement.temp.celsius(),
            pressure: measurement.pres.hpa(),
            relative_humidity: measurement.hum.percent(),
            gas_resistance: measurement.gas.0,
            heater_stable,
        }
    }
}
