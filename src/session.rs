//! Session-level entry points.
//!
//! A session owns its port for its whole lifetime; dropping the port at the
//! end (on success and on every error) releases the bus endpoint.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::acquisition::{Acquisition, AcquisitionBudget, AcquisitionCycle, CycleState, Step};
use crate::calibrator::{CalibrationResult, ProbeAdc, ThresholdCalibrator, DEFAULT_MAX_POLLS};
use crate::driver::Bme680;
use crate::error::{AcquisitionError, CalibrationError};
use crate::port::SensorPort;
use crate::settings::Config;
use crate::sink::{ReadingRecord, ReadingSink};
use crate::Milliseconds;

/// Default BME680 address (SDO pulled low).
pub const BME680_ADDRESS: u16 = 0x76;
/// Default MCP342x address (address pins floating).
pub const MCP342X_ADDRESS: u16 = 0x68;
/// First user-accessible I2C adapter on a Raspberry Pi.
pub const DEFAULT_BUS_PATH: &str = "/dev/i2c-1";

/// Everything an acquisition session needs besides its port and sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub budget: AcquisitionBudget,
    /// Idle time after each accepted reading except the last.
    pub inter_sample_delay: Milliseconds,
    pub config: Config,
    /// Feed each accepted temperature back into the heater target.
    pub track_ambient: bool,
}

impl SessionOptions {
    pub fn new(sample_count: u32, inter_sample_delay: Milliseconds) -> Self {
        Self {
            budget: AcquisitionBudget::new(sample_count),
            inter_sample_delay,
            config: Config::default(),
            track_ambient: false,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(1, Milliseconds(0))
    }
}

/// Runs one forced-mode acquisition session against the BME680 behind `port`.
///
/// Every accepted reading is handed to `sink`; sink failures are logged and
/// ignored. A partial set is returned as `Ok` with
/// [`Completion::Partial`](crate::Completion::Partial); use
/// [`Acquisition::require_complete`] to turn it into an error.
pub fn run_acquisition_session<P, S>(
    port: P,
    options: &SessionOptions,
    mut sink: S,
) -> Result<Acquisition, AcquisitionError>
where
    P: SensorPort,
    S: ReadingSink,
{
    let mut cycle = AcquisitionCycle::configure(Bme680::new(port), options.config, options.budget)?
        .track_ambient(options.track_ambient);

    let mut readings = Vec::with_capacity(options.budget.target_count as usize);
    loop {
        match cycle.step()? {
            Step::Accepted(reading) => {
                if let Err(e) = sink.persist(&ReadingRecord::now(&reading)) {
                    warn!("could not persist reading: {}", e);
                }
                readings.push(reading);
                if cycle.state() != CycleState::Done {
                    cycle.pause(options.inter_sample_delay.0);
                }
            }
            Step::Rejected(_) => {}
            Step::Done(completion) => {
                info!(
                    "session finished: {} reading(s) in {} attempt(s)",
                    readings.len(),
                    cycle.attempts()
                );
                return Ok(Acquisition {
                    readings,
                    completion,
                    attempts: cycle.attempts(),
                });
            }
        }
    }
}

/// Limits for one calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationOptions {
    pub max_polls: u32,
    pub saturation_high: u8,
    pub saturation_low: u8,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            saturation_high: u8::MAX,
            saturation_low: 1,
        }
    }
}

fn calibrator<A: ProbeAdc, O: OutputPin>(
    adc: A,
    output: O,
    options: &CalibrationOptions,
) -> ThresholdCalibrator<A, O> {
    ThresholdCalibrator::new(adc, output)
        .with_max_polls(options.max_polls)
        .with_saturation(options.saturation_high, options.saturation_low)
}

/// One charge/discharge round trip of the soil probe.
pub fn run_calibration<A, O>(
    adc: A,
    output: O,
    options: &CalibrationOptions,
) -> Result<CalibrationResult, CalibrationError>
where
    A: ProbeAdc,
    O: OutputPin,
{
    calibrator(adc, output, options).run()
}

/// `count` calibration runs separated by `pause`, stopping at the first error.
pub fn run_calibration_series<A, O, D>(
    adc: A,
    output: O,
    options: &CalibrationOptions,
    count: u32,
    pause: Milliseconds,
    delay: &mut D,
) -> Result<Vec<CalibrationResult>, CalibrationError>
where
    A: ProbeAdc,
    O: OutputPin,
    D: DelayNs,
{
    let mut calibrator = calibrator(adc, output, options);
    let mut results = Vec::with_capacity(count as usize);
    for run in 0..count {
        if run > 0 {
            delay.delay_ms(pause.0);
        }
        results.push(calibrator.run()?);
    }
    Ok(results)
}

#[cfg(target_os = "linux")]
pub use self::linux::open_port;

#[cfg(target_os = "linux")]
mod linux {
    use std::path::Path;

    use crate::bus::BusHandle;
    use crate::error::AcquisitionError;
    use crate::linux::LinuxI2c;
    use crate::port::{BusPort, StdDelay};

    /// Opens `path` and binds `address`, ready for a driver.
    pub fn open_port(
        path: impl AsRef<Path>,
        address: u16,
    ) -> Result<BusPort<LinuxI2c, StdDelay>, AcquisitionError> {
        let mut bus = BusHandle::open(path).map_err(AcquisitionError::Bus)?;
        bus.bind_address(address).map_err(AcquisitionError::Bus)?;
        Ok(BusPort::new(bus, StdDelay))
    }
}
