//! BME680 register-level driver.
//!
//! The `STATE` parameter tracks initialization at compile time: only a
//! [`Ready`] sensor can be configured, triggered or read.

use core::marker::PhantomData;

use log::debug;

use crate::error::{BusError, SensorError};
use crate::port::SensorPort;
use crate::settings::Config;
use crate::{Celsius, Measurement, Milliseconds};

/// Register map.
pub(crate) mod regs {
    pub const RES_HEAT_VAL: u8 = 0x00;
    pub const RES_HEAT_RANGE: u8 = 0x02;
    pub const RANGE_SW_ERR: u8 = 0x04;
    pub const FIELD_0: u8 = 0x1D;
    pub const RES_HEAT_0: u8 = 0x5A;
    pub const GAS_WAIT_0: u8 = 0x64;
    pub const CTRL_GAS_0: u8 = 0x70;
    pub const CTRL_GAS_1: u8 = 0x71;
    pub const CTRL_HUM: u8 = 0x72;
    pub const CTRL_MEAS: u8 = 0x74;
    pub const CONFIG: u8 = 0x75;
    pub const CHIP_ID: u8 = 0xD0;
    pub const SOFT_RESET: u8 = 0xE0;
}

/// Memory addresses and sizes of the two calibration blocks.
mod calib_mem {
    pub const ADDR: [u8; 2] = [0x89, 0xE1];
    pub const SIZES: [usize; 2] = [25, 16];
    pub const TOTAL_SIZE: usize = 25 + 16;
}

pub const CHIP_ID: u8 = 0x61;
const SOFT_RESET_CMD: u8 = 0xB6;
const RESET_PERIOD_MS: u32 = 10;
/// Status byte, indices, pressure, temperature, humidity, reserved, gas.
pub const FIELD_LENGTH: usize = 15;

const MODE_MASK: u8 = 0b11;
const MODE_FORCED: u8 = 0b01;
const RUN_GAS: u8 = 1 << 4;
const HEAT_OFF: u8 = 1 << 3;

// --- Typestates ---

/// Created but not yet reset or loaded with calibration data.
pub struct Uninitialized;
/// Calibration loaded; can be configured and measured.
pub struct Ready;

/// Factory-fused compensation coefficients, unique to every chip.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CalibData {
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    pub par_g1: i8,
    pub par_g2: i16,
    pub par_g3: i8,
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    pub res_heat_range: u8,
    pub res_heat_val: u8,
    pub range_sw_err: i8,
}

impl CalibData {
    /// Maps the concatenated calibration blocks to coefficients.
    /// See BME680 datasheet, section 3.11.1.
    fn from_bytes(buffer: &[u8; calib_mem::TOTAL_SIZE]) -> Self {
        let le = |lsb: usize, msb: usize| u16::from(buffer[lsb]) | (u16::from(buffer[msb]) << 8);

        CalibData {
            par_t1: le(33, 34),
            par_t2: le(1, 2) as i16,
            par_t3: buffer[3] as i8,
            par_p1: le(5, 6),
            par_p2: le(7, 8) as i16,
            par_p3: buffer[9] as i8,
            par_p4: le(11, 12) as i16,
            par_p5: le(13, 14) as i16,
            par_p6: buffer[16] as i8,
            par_p7: buffer[15] as i8,
            par_p8: le(19, 20) as i16,
            par_p9: le(21, 22) as i16,
            par_p10: buffer[23],
            par_h1: (u16::from(buffer[27]) << 4) | u16::from(buffer[26] & 0x0F),
            par_h2: (u16::from(buffer[25]) << 4) | u16::from(buffer[26] >> 4),
            par_h3: buffer[28] as i8,
            par_h4: buffer[29] as i8,
            par_h5: buffer[30] as i8,
            par_h6: buffer[31],
            par_h7: buffer[32] as i8,
            par_g1: buffer[37] as i8,
            par_g2: le(35, 36) as i16,
            par_g3: buffer[38] as i8,
            ..CalibData::default()
        }
    }
}

/// One decoded field-data block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldData {
    /// Set when the block holds a measurement not read before.
    pub new_data: bool,
    pub meas_index: u8,
    pub gas_valid: bool,
    /// The heater plate reached its target before the gas conversion.
    pub heat_stable: bool,
    pub(crate) temp_adc: u32,
    pub(crate) press_adc: u32,
    pub(crate) hum_adc: u16,
    pub(crate) gas_adc: u16,
    pub(crate) gas_range: u8,
}

impl FieldData {
    /// Decodes the block read from `0x1D`.
    pub(crate) fn decode(buffer: &[u8]) -> Self {
        let adc20 = |i: usize| {
            (u32::from(buffer[i]) << 12)
                | (u32::from(buffer[i + 1]) << 4)
                | (u32::from(buffer[i + 2]) >> 4)
        };

        FieldData {
            new_data: buffer[0] & 0x80 != 0,
            meas_index: buffer[1],
            press_adc: adc20(2),
            temp_adc: adc20(5),
            hum_adc: (u16::from(buffer[8]) << 8) | u16::from(buffer[9]),
            gas_adc: (u16::from(buffer[13]) << 2) | (u16::from(buffer[14]) >> 6),
            gas_range: buffer[14] & 0x0F,
            gas_valid: buffer[14] & 0x20 != 0,
            heat_stable: buffer[14] & 0x10 != 0,
        }
    }
}

/// The BME680 driver.
///
/// Start with [`Bme680::new`], then [`Bme680::init`] to reach [`Ready`].
pub struct Bme680<P, STATE> {
    pub(crate) port: P,
    pub(crate) calib_data: CalibData,
    pub(crate) config: Config,
    _state: PhantomData<STATE>,
}

impl<P: SensorPort> Bme680<P, Uninitialized> {
    /// Wraps a port bound to the sensor. Does not touch the bus.
    pub fn new(port: P) -> Self {
        Bme680 {
            port,
            calib_data: CalibData::default(),
            config: Config::default(),
            _state: PhantomData,
        }
    }

    /// Soft-resets the sensor, verifies its chip id and loads calibration data.
    pub fn init(mut self) -> Result<Bme680<P, Ready>, SensorError> {
        self.port.write(regs::SOFT_RESET, &[SOFT_RESET_CMD])?;
        self.port.delay_ms(RESET_PERIOD_MS);

        let chip_id = self.read_reg_byte(regs::CHIP_ID)?;
        if chip_id != CHIP_ID {
            return Err(SensorError::UnknownChip(chip_id));
        }

        let calib_data = self.get_calib_data()?;
        debug!("BME680 calibration loaded: {:?}", calib_data);

        Ok(Bme680 {
            port: self.port,
            calib_data,
            config: self.config,
            _state: PhantomData,
        })
    }

    fn get_calib_data(&mut self) -> Result<CalibData, BusError> {
        let mut buffer = [0u8; calib_mem::TOTAL_SIZE];

        let first = self.port.read(calib_mem::ADDR[0], calib_mem::SIZES[0])?;
        buffer[..calib_mem::SIZES[0]].copy_from_slice(&first);
        let second = self.port.read(calib_mem::ADDR[1], calib_mem::SIZES[1])?;
        buffer[calib_mem::SIZES[0]..].copy_from_slice(&second);

        let mut calib_data = CalibData::from_bytes(&buffer);

        // Heater-specific values live outside the two blocks.
        calib_data.res_heat_val = self.read_reg_byte(regs::RES_HEAT_VAL)?;
        calib_data.res_heat_range = (self.read_reg_byte(regs::RES_HEAT_RANGE)? >> 4) & 0x03;
        calib_data.range_sw_err = (self.read_reg_byte(regs::RANGE_SW_ERR)? as i8) >> 4;

        Ok(calib_data)
    }
}

impl<P: SensorPort, STATE> Bme680<P, STATE> {
    fn read_reg_byte(&mut self, register: u8) -> Result<u8, BusError> {
        Ok(self.port.read(register, 1)?[0])
    }

    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.port.write(register, &[value])
    }

    /// Read-modify-write of the bits selected by `mask`.
    fn update_reg(&mut self, register: u8, mask: u8, value: u8) -> Result<(), BusError> {
        let current = self.read_reg_byte(register)?;
        self.write_reg(register, (current & !mask) | (value & mask))
    }

    /// Hands the port back.
    pub fn release(self) -> P {
        self.port
    }
}

impl<P: SensorPort> Bme680<P, Ready> {
    /// Reads the chip id register (0x61 for a BME680).
    pub fn read_chip_id(&mut self) -> Result<u8, BusError> {
        self.read_reg_byte(regs::CHIP_ID)
    }

    pub fn calib_data(&self) -> &CalibData {
        &self.calib_data
    }

    /// The configuration last applied.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Applies oversampling, filter and heater settings. Leaves the sensor asleep.
    pub fn configure(&mut self, config: Config) -> Result<(), SensorError> {
        config.validate()?;

        let osrs = &config.osrs_config;
        self.update_reg(regs::CTRL_HUM, 0x07, osrs.hum_osrs as u8)?;
        let temp_pres = ((osrs.temp_osrs as u8) << 5) | ((osrs.pres_osrs as u8) << 2);
        self.update_reg(regs::CTRL_MEAS, 0xFF, temp_pres)?;
        self.update_reg(regs::CONFIG, 0x1C, (config.iir_filter as u8) << 2)?;

        match config.gas_profile {
            Some(profile) => {
                self.write_heater_profile(&profile, config.ambient_temp)?;
                self.update_reg(regs::CTRL_GAS_0, HEAT_OFF, 0)?;
                self.update_reg(regs::CTRL_GAS_1, RUN_GAS | 0x0F, RUN_GAS | profile.index as u8)?;
            }
            None => {
                self.update_reg(regs::CTRL_GAS_1, RUN_GAS, 0)?;
            }
        }

        self.config = config;
        debug!(
            "BME680 configured: {:?}, measurement takes {} ms",
            config,
            config.measurement_duration().0
        );
        Ok(())
    }

    /// Recomputes the heater resistance for a new ambient temperature.
    ///
    /// The plate only reaches its target if the ambient estimate is close, so
    /// callers feed back the latest measured temperature.
    pub fn set_heater_ambient(&mut self, ambient: Celsius) -> Result<(), SensorError> {
        self.config.ambient_temp = ambient;
        if let Some(profile) = self.config.gas_profile {
            self.write_heater_profile(&profile, ambient)?;
        }
        Ok(())
    }

    /// Wait required between [`Bme680::trigger_forced`] and [`Bme680::read_field_data`].
    pub fn measurement_duration(&self) -> Milliseconds {
        self.config.measurement_duration()
    }

    /// Starts one forced-mode measurement. The sensor sleeps again when done.
    pub fn trigger_forced(&mut self) -> Result<(), BusError> {
        self.update_reg(regs::CTRL_MEAS, MODE_MASK, MODE_FORCED)
    }

    /// Sleeps through the port's delay provider.
    pub fn delay_ms(&mut self, ms: u32) {
        self.port.delay_ms(ms);
    }

    /// Reads and decodes the field-data block.
    pub fn read_field_data(&mut self) -> Result<FieldData, BusError> {
        let sample = self.port.read(regs::FIELD_0, FIELD_LENGTH)?;
        Ok(FieldData::decode(&sample))
    }

    /// Converts raw ADC values into fixed-point physical units.
    pub fn compensate(&self, field: &FieldData) -> Measurement {
        self.compensate_with(field, &self.config)
    }
}

#[cfg(test)]
impl<P> Bme680<P, Ready> {
    /// A ready sensor with known coefficients and the default configuration.
    pub(crate) fn with_calib(port: P, calib_data: CalibData) -> Self {
        Bme680 {
            port,
            calib_data,
            config: Config::default(),
            _state: PhantomData,
        }
    }
}
