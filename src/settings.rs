use crate::error::SensorError;
use crate::{Celsius, Milliseconds};

/// Longest encodable heater duration: 6-bit mantissa times the 64 ms multiplier.
pub const MAX_HEATER_DURATION_MS: u32 = 0x3F * 64;

/// Oversampling settings for temperature, pressure and humidity.
///
/// Higher rates average more samples in hardware. That lowers noise but
/// lengthens every forced-mode measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Oversampling {
    /// Channel disabled.
    Skipped = 0,
    #[default]
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    /// Number of ADC conversion cycles this setting costs.
    pub const fn cycles(self) -> u32 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// Oversampling for the three environmental channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OversamplingConfig {
    pub temp_osrs: Oversampling,
    pub hum_osrs: Oversampling,
    pub pres_osrs: Oversampling,
}

impl Default for OversamplingConfig {
    fn default() -> Self {
        Self {
            temp_osrs: Oversampling::X8,
            hum_osrs: Oversampling::X2,
            pres_osrs: Oversampling::X4,
        }
    }
}

impl OversamplingConfig {
    /// Returns `true` if all channels are `Skipped`.
    pub fn is_all_skipped(&self) -> bool {
        self.temp_osrs == Oversampling::Skipped
            && self.hum_osrs == Oversampling::Skipped
            && self.pres_osrs == Oversampling::Skipped
    }

    fn total_cycles(&self) -> u32 {
        self.temp_osrs.cycles() + self.hum_osrs.cycles() + self.pres_osrs.cycles()
    }
}

/// IIR filter coefficient. Smooths pressure and temperature only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IIRFilter {
    IIR0 = 0,
    IIR1 = 1,
    #[default]
    IIR3 = 2,
    IIR7 = 3,
    IIR15 = 4,
    IIR31 = 5,
    IIR63 = 6,
    IIR127 = 7,
}

/// Heater profile slots stored in the sensor (0 to 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum GasProfileIndex {
    #[default]
    Profile0 = 0,
    Profile1 = 1,
    Profile2 = 2,
    Profile3 = 3,
    Profile4 = 4,
    Profile5 = 5,
    Profile6 = 6,
    Profile7 = 7,
    Profile8 = 8,
    Profile9 = 9,
}

/// Gas heater plate profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasProfile {
    pub index: GasProfileIndex,
    /// Plate target temperature, whole degrees. Capped at 400 °C when applied.
    pub target_temp: Celsius,
    /// How long the plate is held at temperature before the gas conversion.
    pub wait_time: Milliseconds,
}

impl Default for GasProfile {
    fn default() -> Self {
        Self {
            index: GasProfileIndex::Profile0,
            target_temp: Celsius(320),
            wait_time: Milliseconds(150),
        }
    }
}

impl GasProfile {
    /// Encodes the heater duration as the `gas_wait_x` register value.
    ///
    /// Bits 5:0 hold the mantissa, bits 7:6 select a multiplier of 1, 4, 16 or 64 ms.
    pub fn encoded_wait(&self) -> Result<u8, SensorError> {
        let wait_time = self.wait_time.0;
        if wait_time > MAX_HEATER_DURATION_MS {
            return Err(SensorError::InvalidWaitTime(wait_time));
        }

        let (multiplier, multiplier_bits) = if wait_time <= 63 {
            (1, 0b00)
        } else if wait_time <= 252 {
            (4, 0b01)
        } else if wait_time <= 1008 {
            (16, 0b10)
        } else {
            (64, 0b11)
        };

        let base_value = (wait_time / multiplier) as u8;
        Ok((base_value & 0x3F) | (multiplier_bits << 6))
    }
}

/// Complete sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub osrs_config: OversamplingConfig,
    pub iir_filter: IIRFilter,
    /// `None` disables the heater and the gas conversion.
    pub gas_profile: Option<GasProfile>,
    /// Ambient estimate used to compute the heater resistance, whole degrees.
    pub ambient_temp: Celsius,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osrs_config: OversamplingConfig::default(),
            iir_filter: IIRFilter::default(),
            gas_profile: Some(GasProfile::default()),
            ambient_temp: Celsius(25),
        }
    }
}

impl Config {
    pub fn gas_enabled(&self) -> bool {
        self.gas_profile.is_some()
    }

    /// Rejects settings the sensor cannot represent.
    pub fn validate(&self) -> Result<(), SensorError> {
        if let Some(profile) = self.gas_profile {
            profile.encoded_wait()?;
        }
        Ok(())
    }

    /// Time a forced-mode measurement needs before its results can be read.
    ///
    /// Each oversampling cycle costs 1963 µs, TPH switching 4 × 477 µs and the
    /// gas conversion 5 × 477 µs; the sum is rounded to milliseconds, one
    /// millisecond of wake-up is added, then the heater duration when gas is on.
    /// The result is never zero.
    pub fn measurement_duration(&self) -> Milliseconds {
        let mut tph_us = self.osrs_config.total_cycles() * 1963;
        tph_us += 477 * 4;
        tph_us += 477 * 5;
        tph_us += 500;

        let mut duration_ms = tph_us / 1000 + 1;
        if let Some(profile) = self.gas_profile {
            duration_ms += profile.wait_time.0;
        }
        Milliseconds(duration_ms)
    }
}

/// Fluent builder for [`Config`]. Starts from [`Config::default`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    pub fn iir_filter(mut self, filter: IIRFilter) -> Self {
        self.config.iir_filter = filter;
        self
    }

    /// `None` turns the gas conversion off.
    pub fn gas_profile(mut self, profile: Option<GasProfile>) -> Self {
        self.config.gas_profile = profile;
        self
    }

    pub fn ambient_temp(mut self, temp: Celsius) -> Self {
        self.config.ambient_temp = temp;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
