//! Plausibility checks and air-quality classification of physical readings.
//!
//! Physical ranges are open intervals. Gas bands are half-open
//! (`lower <= ohms < upper`) and are searched from the best bucket down, so a
//! value sitting on a shared edge always lands in the better bucket.

use std::fmt;

use crate::error::ValidationError;
use crate::reading::PhysicalReading;

/// The reading field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Temperature,
    Pressure,
    Humidity,
    GasResistance,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Temperature => "temperature",
            Field::Pressure => "pressure",
            Field::Humidity => "humidity",
            Field::GasResistance => "gas_resistance",
        })
    }
}

/// Air quality derived from gas resistance. Declared best first, so `<` means
/// "better than".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AirQualityBucket {
    Good,
    Average,
    Low,
    Poor,
    Terrible,
    /// Falls in none of the bands.
    OutOfRange,
}

impl fmt::Display for AirQualityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AirQualityBucket::Good => "good",
            AirQualityBucket::Average => "average",
            AirQualityBucket::Low => "low",
            AirQualityBucket::Poor => "poor",
            AirQualityBucket::Terrible => "terrible",
            AirQualityBucket::OutOfRange => "out of range",
        })
    }
}

/// Exclusive plausibility band: `min < x < max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min < value && value < self.max
    }
}

/// Gas resistance band for one bucket, in Ohms: `lower <= x < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasBand {
    pub bucket: AirQualityBucket,
    pub lower: u32,
    pub upper: u32,
}

impl GasBand {
    pub const fn new(bucket: AirQualityBucket, lower: u32, upper: u32) -> Self {
        Self {
            bucket,
            lower,
            upper,
        }
    }

    pub fn contains(&self, ohms: u32) -> bool {
        self.lower <= ohms && ohms < self.upper
    }
}

/// Greenhouse defaults.
const GAS_BANDS: [GasBand; 5] = [
    GasBand::new(AirQualityBucket::Good, 431_331, 521_177),
    GasBand::new(AirQualityBucket::Average, 213_212, 297_625),
    GasBand::new(AirQualityBucket::Low, 108_042, 148_977),
    GasBand::new(AirQualityBucket::Poor, 54_586, 75_010),
    GasBand::new(AirQualityBucket::Terrible, 13_591, 37_395),
];

/// A reading that passed every check, with its bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedReading {
    pub reading: PhysicalReading,
    pub bucket: AirQualityBucket,
}

/// Range-checks readings and buckets their gas resistance.
///
/// ```
/// use envrig::{AirQualityBucket, PhysicalReading, ReadingValidator};
///
/// let validator = ReadingValidator::default();
/// let reading = PhysicalReading::new(22.5, 1013.25, 45.0, 460_000, true);
/// assert_eq!(validator.classify(&reading), Ok(AirQualityBucket::Good));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingValidator {
    temperature: Band,
    pressure: Band,
    humidity: Band,
    gas_bands: Vec<GasBand>,
}

impl Default for ReadingValidator {
    fn default() -> Self {
        Self {
            temperature: Band::new(0.0, 32.0),
            pressure: Band::new(800.0, 1100.0),
            humidity: Band::new(0.0, 100.0),
            gas_bands: GAS_BANDS.to_vec(),
        }
    }
}

impl ReadingValidator {
    pub fn with_temperature(mut self, band: Band) -> Self {
        self.temperature = band;
        self
    }

    pub fn with_pressure(mut self, band: Band) -> Self {
        self.pressure = band;
        self
    }

    pub fn with_humidity(mut self, band: Band) -> Self {
        self.humidity = band;
        self
    }

    /// Replaces the gas bands. They are searched in ascending bucket order
    /// regardless of the order given here.
    pub fn with_gas_bands(mut self, mut bands: Vec<GasBand>) -> Self {
        bands.sort_by_key(|band| band.bucket);
        self.gas_bands = bands;
        self
    }

    pub fn gas_bands(&self) -> &[GasBand] {
        &self.gas_bands
    }

    /// Bucket for a raw resistance; [`AirQualityBucket::OutOfRange`] when no
    /// band matches.
    pub fn bucket_for(&self, ohms: u32) -> AirQualityBucket {
        self.gas_bands
            .iter()
            .find(|band| band.contains(ohms))
            .map_or(AirQualityBucket::OutOfRange, |band| band.bucket)
    }

    /// Checks the physical fields, then buckets the gas resistance.
    pub fn classify(&self, reading: &PhysicalReading) -> Result<AirQualityBucket, ValidationError> {
        check(Field::Temperature, &self.temperature, reading.temperature)?;
        check(Field::Pressure, &self.pressure, reading.pressure)?;
        check(Field::Humidity, &self.humidity, reading.relative_humidity)?;

        match self.bucket_for(reading.gas_resistance) {
            AirQualityBucket::OutOfRange => Err(ValidationError::OutOfRangeReading {
                field: Field::GasResistance,
                value: f64::from(reading.gas_resistance),
            }),
            bucket => Ok(bucket),
        }
    }

    pub fn validate(
        &self,
        reading: &PhysicalReading,
    ) -> Result<ClassifiedReading, ValidationError> {
        let bucket = self.classify(reading)?;
        Ok(ClassifiedReading {
            reading: *reading,
            bucket,
        })
    }
}

fn check(field: Field, band: &Band, value: f64) -> Result<(), ValidationError> {
    if band.contains(value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRangeReading { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(gas_resistance: u32) -> PhysicalReading {
        PhysicalReading::new(22.5, 1013.25, 45.0, gas_resistance, true)
    }

    #[test]
    fn greenhouse_scenario_is_good() {
        let validator = ReadingValidator::default();
        let classified = validator.validate(&reading(460_000)).unwrap();
        assert_eq!(classified.bucket, AirQualityBucket::Good);
        assert_eq!(classified.reading, reading(460_000));
    }

    #[test]
    fn resistance_below_every_band() {
        let err = ReadingValidator::default().classify(&reading(5000)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRangeReading {
                field: Field::GasResistance,
                value: 5000.0
            }
        );
        assert_eq!(err.to_string(), "gas_resistance reading 5000 is out of range");
    }

    #[test]
    fn resistance_between_bands() {
        let validator = ReadingValidator::default();
        assert_eq!(validator.bucket_for(300_000), AirQualityBucket::OutOfRange);
        assert!(validator.classify(&reading(300_000)).is_err());
    }

    #[test]
    fn every_default_band() {
        let validator = ReadingValidator::default();
        assert_eq!(validator.bucket_for(250_000), AirQualityBucket::Average);
        assert_eq!(validator.bucket_for(120_000), AirQualityBucket::Low);
        assert_eq!(validator.bucket_for(60_000), AirQualityBucket::Poor);
        assert_eq!(validator.bucket_for(20_000), AirQualityBucket::Terrible);
    }

    #[test]
    fn band_edges_are_half_open() {
        let validator = ReadingValidator::default();
        for _ in 0..3 {
            assert_eq!(validator.bucket_for(431_331), AirQualityBucket::Good);
            assert_eq!(validator.bucket_for(521_177), AirQualityBucket::OutOfRange);
            assert_eq!(validator.bucket_for(13_591), AirQualityBucket::Terrible);
        }
    }

    #[test]
    fn shared_edge_goes_to_the_better_bucket() {
        let validator = ReadingValidator::default().with_gas_bands(vec![
            GasBand::new(AirQualityBucket::Average, 100, 200),
            GasBand::new(AirQualityBucket::Good, 150, 300),
        ]);
        assert_eq!(validator.bucket_for(150), AirQualityBucket::Good);
        assert_eq!(validator.bucket_for(149), AirQualityBucket::Average);
    }

    #[test]
    fn classification_is_idempotent() {
        let validator = ReadingValidator::default();
        let first = validator.validate(&reading(250_000)).unwrap();
        let second = validator.validate(&first.reading).unwrap();
        assert_eq!(first.bucket, second.bucket);
    }

    #[test]
    fn physical_ranges_are_exclusive() {
        let validator = ReadingValidator::default();

        let mut cold = reading(460_000);
        cold.temperature = 0.0;
        assert_eq!(
            validator.classify(&cold),
            Err(ValidationError::OutOfRangeReading {
                field: Field::Temperature,
                value: 0.0
            })
        );

        let mut storm = reading(460_000);
        storm.pressure = 1100.0;
        assert!(matches!(
            validator.classify(&storm),
            Err(ValidationError::OutOfRangeReading {
                field: Field::Pressure,
                ..
            })
        ));

        let mut saturated = reading(460_000);
        saturated.relative_humidity = 100.0;
        assert!(matches!(
            validator.classify(&saturated),
            Err(ValidationError::OutOfRangeReading {
                field: Field::Humidity,
                ..
            })
        ));
    }

    #[test]
    fn overridden_temperature_band() {
        let validator = ReadingValidator::default().with_temperature(Band::new(-40.0, 85.0));
        let mut frost = reading(460_000);
        frost.temperature = -5.0;
        assert_eq!(validator.classify(&frost), Ok(AirQualityBucket::Good));
    }
}
