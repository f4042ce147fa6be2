//! Forced-mode acquisition cycle.
//!
//! ```text
//! Idle ─► Configuring ─► Triggered ─► Waiting ─► Reading ─┬─► Accepted ─┐
//!              │             ▲                            └─► Rejected ─┤
//!              ▼             └──────────────── (budget left) ◄──────────┤
//!            Fault                                                     ▼
//!                                                                     Done
//! ```
//!
//! Every iteration consumes one attempt. Only heater-stable samples count
//! towards the target, and the attempt ceiling bounds the session's wall-clock
//! time when the heater never settles.

use std::fmt;

use log::{debug, error, info, warn};

use crate::driver::{Bme680, Ready, Uninitialized};
use crate::error::{AcquisitionError, BusError, SensorError};
use crate::port::SensorPort;
use crate::reading::PhysicalReading;
use crate::settings::Config;
use crate::{Celsius, Milliseconds};

/// Attempts granted on top of the target count by [`AcquisitionBudget::new`].
pub const DEFAULT_ATTEMPT_SLACK: u32 = 3;

/// How many stable readings to collect and how many iterations that may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionBudget {
    pub target_count: u32,
    pub max_attempts: u32,
}

impl AcquisitionBudget {
    /// `target_count` stable readings within `target_count + 3` attempts.
    pub fn new(target_count: u32) -> Self {
        Self {
            target_count,
            max_attempts: target_count.saturating_add(DEFAULT_ATTEMPT_SLACK),
        }
    }

    pub fn with_max_attempts(target_count: u32, max_attempts: u32) -> Self {
        Self {
            target_count,
            max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Configuring,
    Triggered,
    Waiting,
    Reading,
    Accepted,
    Rejected,
    Done,
    Fault,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Configuring => "configuring",
            CycleState::Triggered => "triggered",
            CycleState::Waiting => "waiting",
            CycleState::Reading => "reading",
            CycleState::Accepted => "accepted",
            CycleState::Rejected => "rejected",
            CycleState::Done => "done",
            CycleState::Fault => "fault",
        };
        f.write_str(name)
    }
}

/// Why a fetched sample was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The heater plate had not reached its target temperature.
    HeaterUnstable,
    /// The block still held an already consumed measurement.
    NoNewData,
}

/// How a finished cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The target count was reached.
    Full,
    /// The attempt budget ran out first.
    Partial { acquired: u32, target: u32 },
}

/// Outcome of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Accepted(PhysicalReading),
    Rejected(RejectReason),
    /// Nothing left to do; no bus traffic happened.
    Done(Completion),
}

/// Readings collected by a finished cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub readings: Vec<PhysicalReading>,
    pub completion: Completion,
    pub attempts: u32,
}

impl Acquisition {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Full
    }

    /// The readings, or [`AcquisitionError::PartialAcquisition`] when fewer
    /// than the target were collected.
    pub fn require_complete(self) -> Result<Vec<PhysicalReading>, AcquisitionError> {
        match self.completion {
            Completion::Full => Ok(self.readings),
            Completion::Partial { acquired, target } => {
                Err(AcquisitionError::PartialAcquisition { acquired, target })
            }
        }
    }
}

/// The forced-mode measurement state machine for one sensor.
pub struct AcquisitionCycle<P: SensorPort> {
    sensor: Bme680<P, Ready>,
    budget: AcquisitionBudget,
    state: CycleState,
    stable_count: u32,
    attempts: u32,
    wait: Milliseconds,
    track_ambient: bool,
    /// Heater re-target deferred to the start of the next iteration.
    pending_ambient: Option<Celsius>,
}

impl<P: SensorPort> AcquisitionCycle<P> {
    /// Initializes and configures `sensor`.
    ///
    /// A failure here is the `Configuring → Fault` transition: no cycle is
    /// returned and the session must be aborted.
    pub fn configure(
        sensor: Bme680<P, Uninitialized>,
        config: Config,
        budget: AcquisitionBudget,
    ) -> Result<Self, AcquisitionError> {
        debug!("acquisition: idle -> configuring");
        let sensor = sensor.init().map_err(|e| {
            error!("acquisition: sensor initialization failed: {}", e);
            AcquisitionError::Configuration(e)
        })?;
        Self::with_sensor(sensor, config, budget)
    }

    /// Configures an already initialized sensor.
    pub fn with_sensor(
        mut sensor: Bme680<P, Ready>,
        config: Config,
        budget: AcquisitionBudget,
    ) -> Result<Self, AcquisitionError> {
        sensor.configure(config).map_err(|e| {
            error!("acquisition: configuration failed: {}", e);
            AcquisitionError::Configuration(e)
        })?;

        let wait = sensor.measurement_duration();
        debug!(
            "acquisition: target {} within {} attempts, {} ms per measurement",
            budget.target_count, budget.max_attempts, wait.0
        );

        Ok(Self {
            sensor,
            budget,
            state: CycleState::Configuring,
            stable_count: 0,
            attempts: 0,
            wait,
            track_ambient: false,
            pending_ambient: None,
        })
    }

    /// Re-targets the heater with every accepted temperature.
    ///
    /// The heater registers are rewritten right before the next trigger, so a
    /// failed update faults the cycle in `Triggered` and never costs the
    /// reading that produced it.
    pub fn track_ambient(mut self, enabled: bool) -> Self {
        self.track_ambient = enabled;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn budget(&self) -> AcquisitionBudget {
        self.budget
    }

    /// Wait applied between every trigger and the following read.
    pub fn measurement_wait(&self) -> Milliseconds {
        self.wait
    }

    /// Current completion status, meaningful once the state is `Done`.
    pub fn completion(&self) -> Completion {
        if self.stable_count >= self.budget.target_count {
            Completion::Full
        } else {
            Completion::Partial {
                acquired: self.stable_count,
                target: self.budget.target_count,
            }
        }
    }

    /// Runs one trigger → wait → read → verdict iteration.
    ///
    /// Bus failures move the cycle to `Fault` and are returned as
    /// [`AcquisitionError::AcquisitionFailed`]; every later call returns
    /// [`AcquisitionError::Faulted`].
    pub fn step(&mut self) -> Result<Step, AcquisitionError> {
        match self.state {
            CycleState::Fault => return Err(AcquisitionError::Faulted),
            CycleState::Done => return Ok(Step::Done(self.completion())),
            _ => {}
        }
        if self.is_exhausted() {
            return Ok(Step::Done(self.finish()));
        }

        self.attempts += 1;

        self.enter(CycleState::Triggered);
        if let Some(ambient) = self.pending_ambient.take() {
            if let Err(e) = self.sensor.set_heater_ambient(ambient) {
                return Err(self.sensor_fault(e));
            }
        }
        if let Err(e) = self.sensor.trigger_forced() {
            return Err(self.fault(e));
        }

        self.enter(CycleState::Waiting);
        self.sensor.delay_ms(self.wait.0);

        self.enter(CycleState::Reading);
        let field = match self.sensor.read_field_data() {
            Ok(field) => field,
            Err(e) => return Err(self.fault(e)),
        };

        let gas_enabled = self.sensor.config().gas_enabled();
        let step = if !field.new_data {
            self.reject(RejectReason::NoNewData)
        } else if gas_enabled && !field.heat_stable {
            self.reject(RejectReason::HeaterUnstable)
        } else {
            let measurement = self.sensor.compensate(&field);
            let reading = PhysicalReading::from_measurement(&measurement, field.heat_stable);
            self.stable_count += 1;
            self.enter(CycleState::Accepted);
            info!(
                "accepted reading {}/{}: T {:.2} degC, P {:.2} hPa, H {:.2} %rH, G {} Ohms",
                self.stable_count,
                self.budget.target_count,
                reading.temperature,
                reading.pressure,
                reading.relative_humidity,
                reading.gas_resistance
            );

            if self.track_ambient && gas_enabled {
                self.pending_ambient = Some(Celsius(reading.temperature.round() as i32));
            }
            Step::Accepted(reading)
        };

        if self.is_exhausted() {
            self.finish();
        }
        Ok(step)
    }

    /// Steps until `Done`, collecting every accepted reading.
    pub fn run(&mut self) -> Result<Acquisition, AcquisitionError> {
        let mut readings = Vec::with_capacity(self.budget.target_count as usize);
        loop {
            match self.step()? {
                Step::Accepted(reading) => readings.push(reading),
                Step::Rejected(_) => {}
                Step::Done(completion) => {
                    return Ok(Acquisition {
                        readings,
                        completion,
                        attempts: self.attempts,
                    })
                }
            }
        }
    }

    /// Idles the sensor between iterations. Not part of the measurement wait.
    pub fn pause(&mut self, ms: u32) {
        if ms > 0 {
            self.sensor.delay_ms(ms);
        }
    }

    pub fn sensor(&self) -> &Bme680<P, Ready> {
        &self.sensor
    }

    /// Gives the configured sensor back, e.g. to start another session.
    pub fn release(self) -> Bme680<P, Ready> {
        self.sensor
    }

    fn is_exhausted(&self) -> bool {
        self.stable_count >= self.budget.target_count || self.attempts >= self.budget.max_attempts
    }

    fn finish(&mut self) -> Completion {
        let completion = self.completion();
        if self.state != CycleState::Done {
            self.enter(CycleState::Done);
            if let Completion::Partial { acquired, target } = completion {
                warn!(
                    "acquisition: only {}/{} stable readings after {} attempts",
                    acquired, target, self.attempts
                );
            }
        }
        completion
    }

    fn reject(&mut self, reason: RejectReason) -> Step {
        self.enter(CycleState::Rejected);
        warn!(
            "rejected sample (attempt {}/{}): {:?}",
            self.attempts, self.budget.max_attempts, reason
        );
        Step::Rejected(reason)
    }

    fn fault(&mut self, source: BusError) -> AcquisitionError {
        let state = self.state;
        error!("acquisition fault while {}: {}", state, source);
        self.state = CycleState::Fault;
        AcquisitionError::AcquisitionFailed { state, source }
    }

    fn sensor_fault(&mut self, source: SensorError) -> AcquisitionError {
        match source {
            SensorError::Bus(e) => self.fault(e),
            other => {
                error!("acquisition fault while {}: {}", self.state, other);
                self.state = CycleState::Fault;
                AcquisitionError::Configuration(other)
            }
        }
    }

    fn enter(&mut self, next: CycleState) {
        debug!("acquisition: {} -> {}", self.state, next);
        self.state = next;
    }
}
