//! Capacitive soil-probe threshold discovery.
//!
//! The probe is charged through a digital output while an MCP342x samples it,
//! then discharged. The saturated readings at the end of each phase become the
//! dry and wet thresholds.

use std::fmt;
use std::time::{Duration, Instant};

use embedded_hal::digital::{Error, OutputPin};
use log::{debug, info, trace, warn};

use crate::error::{BusError, CalibrationError};
use crate::port::SensorPort;

/// Default poll ceiling for each phase.
pub const DEFAULT_MAX_POLLS: u32 = 10_000;

/// Anything that produces one 8-bit probe conversion per call.
pub trait ProbeAdc {
    /// Triggers a conversion and returns its result scaled to `0..=255`.
    ///
    /// Only fresh conversions are returned; a result that cannot be
    /// confirmed as new is an error.
    fn convert(&mut self) -> Result<u8, CalibrationError>;
}

impl<T: ProbeAdc + ?Sized> ProbeAdc for &mut T {
    fn convert(&mut self) -> Result<u8, CalibrationError> {
        T::convert(self)
    }
}

/// MCP342x configuration register bits.
mod mcp {
    /// Write: start a one-shot conversion. Read: set while the result is stale.
    pub const RDY: u8 = 1 << 7;
    pub const CHANNEL_SHIFT: u8 = 5;
    /// One-shot, 12 bit (240 SPS), PGA x1.
    pub const ONE_SHOT_12BIT: u8 = 0b0_00_0_00_00;
    /// A 12-bit conversion takes 1/240 s.
    pub const CONVERSION_MS: u32 = 5;
    pub const MAX_READY_POLLS: u32 = 4;
}

/// One-shot 12-bit driver for the MCP3422/3/4 ADC family.
///
/// The device has no register pointer: the "register" byte of every port
/// transaction is the configuration byte itself. Selecting it with `RDY`
/// cleared is a no-op in one-shot mode, so a port read safely fetches the
/// result.
pub struct Mcp342x<P: SensorPort> {
    port: P,
    config: u8,
}

impl<P: SensorPort> Mcp342x<P> {
    /// Channel 1, one-shot, 12 bit, gain 1.
    pub fn new(port: P) -> Self {
        Self {
            port,
            config: mcp::ONE_SHOT_12BIT,
        }
    }

    /// Selects input channel 1..=4. Out-of-range values wrap onto the two
    /// channel bits.
    pub fn with_channel(mut self, channel: u8) -> Self {
        let bits = (channel.saturating_sub(1) & 0b11) << mcp::CHANNEL_SHIFT;
        self.config = (self.config & !(0b11 << mcp::CHANNEL_SHIFT)) | bits;
        self
    }

    pub fn config(&self) -> u8 {
        self.config
    }

    pub fn release(self) -> P {
        self.port
    }

    fn start_conversion(&mut self) -> Result<(), BusError> {
        self.port.write(self.config | mcp::RDY, &[])
    }

    /// Raw signed 12-bit code, waiting for a fresh result.
    fn fetch(&mut self) -> Result<i16, CalibrationError> {
        let mut polls = 0;
        loop {
            self.port.delay_ms(mcp::CONVERSION_MS);
            let sample = self.port.read(self.config & !mcp::RDY, 3)?;
            let code = i16::from_be_bytes([sample[0], sample[1]]);
            polls += 1;

            if sample[2] & mcp::RDY == 0 {
                return Ok(code);
            }
            if polls >= mcp::MAX_READY_POLLS {
                warn!("mcp342x: result still flagged stale after {} polls", polls);
                return Err(CalibrationError::ConversionNotReady { polls });
            }
        }
    }
}

impl<P: SensorPort> ProbeAdc for Mcp342x<P> {
    fn convert(&mut self) -> Result<u8, CalibrationError> {
        self.start_conversion()?;
        let code = self.fetch()?;
        // 2047 -> 255; negative codes are a floating input.
        let scaled = (code.clamp(0, 2047) >> 3) as u8;
        trace!("mcp342x: code {} -> {}", code, scaled);
        Ok(scaled)
    }
}

/// The two phases of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Charge,
    Discharge,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Charge => "charge",
            Phase::Discharge => "discharge",
        })
    }
}

/// Saturation readings of one charge/discharge round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationResult {
    dry_threshold: u8,
    wet_threshold: u8,
    charge_polls: u32,
    discharge_polls: u32,
    elapsed: Duration,
}

impl CalibrationResult {
    /// Thresholds taken from an earlier run, without diagnostics.
    pub fn from_thresholds(dry_threshold: u8, wet_threshold: u8) -> Self {
        Self {
            dry_threshold,
            wet_threshold,
            charge_polls: 0,
            discharge_polls: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Reading at the end of the charge phase.
    pub fn dry_threshold(&self) -> u8 {
        self.dry_threshold
    }

    /// Reading at the end of the discharge phase.
    pub fn wet_threshold(&self) -> u8 {
        self.wet_threshold
    }

    pub fn charge_polls(&self) -> u32 {
        self.charge_polls
    }

    pub fn discharge_polls(&self) -> u32 {
        self.discharge_polls
    }

    /// Wall-clock time of the full round trip.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Drives the probe through charge and discharge until both saturate.
pub struct ThresholdCalibrator<A, O> {
    adc: A,
    output: O,
    max_polls: u32,
    saturation_high: u8,
    saturation_low: u8,
}

impl<A: ProbeAdc, O: OutputPin> ThresholdCalibrator<A, O> {
    pub fn new(adc: A, output: O) -> Self {
        Self {
            adc,
            output,
            max_polls: DEFAULT_MAX_POLLS,
            saturation_high: u8::MAX,
            saturation_low: 1,
        }
    }

    /// Poll ceiling applied to each phase separately.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Charging stops at `>= high`, discharging at `<= low`.
    pub fn with_saturation(mut self, high: u8, low: u8) -> Self {
        self.saturation_high = high;
        self.saturation_low = low;
        self
    }

    pub fn release(self) -> (A, O) {
        (self.adc, self.output)
    }

    /// One charge/discharge round trip.
    pub fn run(&mut self) -> Result<CalibrationResult, CalibrationError> {
        let start = Instant::now();

        self.output.set_high().map_err(output_error)?;
        let high = self.saturation_high;
        let (charge_polls, dry_threshold) =
            match self.poll_until(Phase::Charge, |value| value >= high) {
                Ok(done) => done,
                Err(e) => {
                    // Never leave the probe charging.
                    if self.output.set_low().is_err() {
                        warn!("calibration: could not drive the probe output low");
                    }
                    return Err(e);
                }
            };

        self.output.set_low().map_err(output_error)?;
        let low = self.saturation_low;
        let (discharge_polls, wet_threshold) =
            self.poll_until(Phase::Discharge, |value| value <= low)?;

        let result = CalibrationResult {
            dry_threshold,
            wet_threshold,
            charge_polls,
            discharge_polls,
            elapsed: start.elapsed(),
        };
        info!(
            "calibration: dry {} after {} polls, wet {} after {} polls, {:.3} s",
            result.dry_threshold,
            result.charge_polls,
            result.wet_threshold,
            result.discharge_polls,
            result.elapsed.as_secs_f64()
        );
        Ok(result)
    }

    fn poll_until(
        &mut self,
        phase: Phase,
        saturated: impl Fn(u8) -> bool,
    ) -> Result<(u32, u8), CalibrationError> {
        let mut last = 0;
        for polls in 1..=self.max_polls {
            last = self.adc.convert()?;
            trace!("calibration: {} poll {} read {}", phase, polls, last);
            if saturated(last) {
                debug!("calibration: {} saturated at {} after {} polls", phase, last, polls);
                return Ok((polls, last));
            }
        }
        Err(CalibrationError::CalibrationTimeout {
            phase,
            polls: self.max_polls,
            last,
        })
    }
}

fn output_error(e: impl Error) -> CalibrationError {
    CalibrationError::Output(e.kind())
}
