//! Soil moisture from raw probe readings.

use std::fmt;

use crate::calibrator::CalibrationResult;
use crate::error::CalibrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoilCondition {
    Dry,
    Moist,
    Wet,
}

impl fmt::Display for SoilCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SoilCondition::Dry => "dry",
            SoilCondition::Moist => "moist",
            SoilCondition::Wet => "wet",
        })
    }
}

/// Splits the wet..dry span of a calibration into thirds.
///
/// The thresholds may be in either order; readings beyond them fall into the
/// nearest outer third.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilClassifier {
    dry: u8,
    wet: u8,
}

impl SoilClassifier {
    pub fn new(calibration: &CalibrationResult) -> Result<Self, CalibrationError> {
        let (dry, wet) = (calibration.dry_threshold(), calibration.wet_threshold());
        if dry == wet {
            return Err(CalibrationError::DegenerateThresholds(dry));
        }
        Ok(Self { dry, wet })
    }

    pub fn classify(&self, value: u8) -> SoilCondition {
        let mut offset = i32::from(value) - i32::from(self.wet);
        let mut span = i32::from(self.dry) - i32::from(self.wet);
        if span < 0 {
            offset = -offset;
            span = -span;
        }

        let scaled = offset * 3;
        if scaled < span {
            SoilCondition::Wet
        } else if scaled < 2 * span {
            SoilCondition::Moist
        } else {
            SoilCondition::Dry
        }
    }
}
