use crate::driver::{regs, Bme680, FieldData};
use crate::error::SensorError;
use crate::port::SensorPort;
use crate::settings::{Config, GasProfile, Oversampling};
use crate::{Celsius, Gas, Humidity, Measurement, Pressure, Temperature};

/// Constants and lookup tables published by Bosch for the gas resistance conversion.
mod gas_constants {
    /// Base compensation per gas range.
    pub static ARRAY1_INT: [u32; 16] = [
        2147483647, 2147483647, 2147483647, 2147483647, 2147483647, 2126008810, 2147483647,
        2130303777, 2147483647, 2147483647, 2143188679, 2136746228, 2147483647, 2126008810,
        2147483647, 2147483647,
    ];
    /// Range scaling from ADC counts to Ohms.
    pub static ARRAY2_INT: [u32; 16] = [
        4096000000, 2048000000, 1024000000, 512000000, 255744255, 127110228, 64000000, 32258064,
        16016016, 8000000, 4000000, 2000000, 1000000, 500000, 250000, 125000,
    ];
}

/// The plate is never driven above this, to protect the membrane.
const MAX_HEATER_TEMP: i32 = 400;

/// Intermediate temperature values. `temp_fine` feeds pressure compensation,
/// `temp_comp` (centi-degrees) feeds humidity compensation.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct CalcTempData {
    pub(crate) temp_fine: i32,
    pub(crate) temp_comp: i32,
}

impl<P: SensorPort, STATE> Bme680<P, STATE> {
    /// Writes heater duration and target resistance into the profile's slots.
    pub(crate) fn write_heater_profile(
        &mut self,
        profile: &GasProfile,
        ambient: Celsius,
    ) -> Result<(), SensorError> {
        let wait = profile.encoded_wait()?;
        let res_heat = self.calc_res_heat(profile.target_temp, ambient);
        let index = profile.index as u8;

        self.port.write(regs::GAS_WAIT_0 + index, &[wait])?;
        self.port.write(regs::RES_HEAT_0 + index, &[res_heat])?;
        Ok(())
    }
}

impl<P, STATE> Bme680<P, STATE> {
    /// Target heater resistance register value for `target` at `ambient`.
    pub(crate) fn calc_res_heat(&self, target: Celsius, ambient: Celsius) -> u8 {
        let calib = &self.calib_data;
        let target_temp = target.0.min(MAX_HEATER_TEMP);

        let var1 = ((ambient.0 * i32::from(calib.par_g3)) / 1000) * 256;
        let var2 = (i32::from(calib.par_g1) + 784)
            * ((((i32::from(calib.par_g2) + 154009) * target_temp * 5) / 100 + 3276800) / 10);
        let var3 = var1 + var2 / 2;
        let var4 = var3 / (i32::from(calib.res_heat_range) + 4);
        let var5 = 131 * i32::from(calib.res_heat_val) + 65536;

        let res_heat_x100 = ((var4 / var5) - 250) * 34;
        ((res_heat_x100 + 50) / 100) as u8
    }

    /// Raw temperature ADC to centi-degrees.
    pub(crate) fn calc_temp(&self, temp_adc: u32) -> CalcTempData {
        let calib = &self.calib_data;

        let var1 = (i64::from(temp_adc) >> 3) - (i64::from(calib.par_t1) << 1);
        let var2 = (var1 * i64::from(calib.par_t2)) >> 11;
        let var3 = ((((var1 >> 1) * (var1 >> 1)) >> 12) * (i64::from(calib.par_t3) << 4)) >> 14;
        let temp_fine = (var2 + var3) as i32;

        CalcTempData {
            temp_fine,
            temp_comp: ((temp_fine * 5) + 128) >> 8,
        }
    }

    /// Raw pressure ADC to Pascal. Needs `t_fine` from temperature compensation.
    pub(crate) fn calc_pres(&self, t_fine: i32, press_adc: u32) -> u32 {
        let calib = &self.calib_data;

        let mut var1 = (i64::from(t_fine) >> 1) - 64_000;
        let mut var2 = ((((var1 >> 2) * (var1 >> 2)) >> 11) * i64::from(calib.par_p6)) >> 2;
        var2 += (var1 * i64::from(calib.par_p5)) << 1;
        var2 = (var2 >> 2) + (i64::from(calib.par_p4) << 16);
        var1 = (((((var1 >> 2) * (var1 >> 2)) >> 13) * (i64::from(calib.par_p3) << 5)) >> 3)
            + ((i64::from(calib.par_p2) * var1) >> 1);
        var1 >>= 18;
        var1 = ((32768 + var1) * i64::from(calib.par_p1)) >> 15;

        if var1 == 0 {
            return 0;
        }

        let mut press_comp = 1_048_576 - i64::from(press_adc);
        press_comp = (press_comp - (var2 >> 12)) * 3125;
        press_comp = if press_comp >= (1 << 30) {
            (press_comp / var1) << 1
        } else {
            (press_comp << 1) / var1
        };

        let var1 =
            (i64::from(calib.par_p9) * (((press_comp >> 3) * (press_comp >> 3)) >> 13)) >> 12;
        let var2 = ((press_comp >> 2) * i64::from(calib.par_p8)) >> 13;
        let var3 = ((press_comp >> 8)
            * (press_comp >> 8)
            * (press_comp >> 8)
            * i64::from(calib.par_p10))
            >> 17;

        press_comp += (var1 + var2 + var3 + (i64::from(calib.par_p7) << 7)) >> 4;
        press_comp.max(0) as u32
    }

    /// Raw humidity ADC to milli-percent, clamped to 0..=100 %.
    pub(crate) fn calc_hum(&self, temp_comp: i32, hum_adc: u16) -> i32 {
        let calib = &self.calib_data;
        let temp_comp = i64::from(temp_comp);

        let var1 = i64::from(hum_adc)
            - (i64::from(calib.par_h1) << 4)
            - (((temp_comp * i64::from(calib.par_h3)) / 100) >> 1);
        let var2 = (i64::from(calib.par_h2)
            * (((temp_comp * i64::from(calib.par_h4)) / 100)
                + (((temp_comp * ((temp_comp * i64::from(calib.par_h5)) / 100)) >> 6) / 100)
                + (1 << 14)))
            >> 10;
        let var3 = var1 * var2;
        let var4 =
            ((i64::from(calib.par_h6) << 7) + ((temp_comp * i64::from(calib.par_h7)) / 100)) >> 4;
        let var5 = ((var3 >> 14) * (var3 >> 14)) >> 10;
        let var6 = (var4 * var5) >> 1;

        let hum = (((var3 + var6) >> 10) * 1000) >> 12;
        hum.clamp(0, 100_000) as i32
    }

    /// Raw gas ADC and range to Ohms.
    pub(crate) fn calc_gas(&self, gas_adc: u16, gas_range: u8) -> u32 {
        let range = usize::from(gas_range & 0x0F);

        let var1 = ((1340 + 5 * i64::from(self.calib_data.range_sw_err))
            * i64::from(gas_constants::ARRAY1_INT[range]))
            >> 16;
        let var2 = (i64::from(gas_adc) << 15) - (1 << 24) + var1;
        let var3 = (i64::from(gas_constants::ARRAY2_INT[range]) * var1) >> 9;

        if var2 <= 0 {
            return 0;
        }
        ((var3 + (var2 >> 1)) / var2) as u32
    }

    /// Compensates every channel `config` enabled; the rest stay zero.
    pub(crate) fn compensate_with(&self, field: &FieldData, config: &Config) -> Measurement {
        let osrs = &config.osrs_config;
        let mut measurement = Measurement::default();

        if osrs.temp_osrs != Oversampling::Skipped {
            let temp = self.calc_temp(field.temp_adc);
            measurement.temp = Temperature(temp.temp_comp);

            // Humidity and pressure both depend on the temperature result.
            if osrs.hum_osrs != Oversampling::Skipped {
                measurement.hum = Humidity(self.calc_hum(temp.temp_comp, field.hum_adc));
            }
            if osrs.pres_osrs != Oversampling::Skipped {
                measurement.pres = Pressure(self.calc_pres(temp.temp_fine, field.press_adc));
            }
        }

        if config.gas_enabled() && field.gas_valid {
            measurement.gas = Gas(self.calc_gas(field.gas_adc, field.gas_range));
        }

        measurement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CalibData, Ready};
    use crate::test_support::NullPort;

    /// Coefficients chosen so the compensation reduces to simple arithmetic.
    fn sensor() -> Bme680<NullPort, Ready> {
        Bme680::with_calib(
            NullPort,
            CalibData {
                par_t2: 2048,
                par_p1: 6250,
                par_h2: 1024,
                ..CalibData::default()
            },
        )
    }

    #[test]
    fn temperature() {
        let temp = sensor().calc_temp(921_600);
        assert_eq!(temp.temp_fine, 115_200);
        assert_eq!(temp.temp_comp, 2250);
    }

    #[test]
    fn pressure() {
        assert_eq!(sensor().calc_pres(115_200, 947_251), 101_325);
    }

    #[test]
    fn pressure_with_zero_coefficient_does_not_divide_by_zero() {
        let bme = Bme680::with_calib(NullPort, CalibData::default());
        assert_eq!(bme.calc_pres(115_200, 500_000), 0);
    }

    #[test]
    fn humidity_is_clamped() {
        let bme = sensor();
        assert_eq!(bme.calc_hum(2250, 11_520), 45_000);
        assert_eq!(bme.calc_hum(2250, u16::MAX), 100_000);
    }

    #[test]
    fn gas_resistance() {
        let bme = sensor();
        assert_eq!(bme.calc_gas(600, 4), 468_719);
        assert_eq!(bme.calc_gas(512, 10), 7812);
    }

    #[test]
    fn heater_resistance() {
        // With zeroed coefficients: var2 = 784 * 574094, var4 = var2 / 2 / 4,
        // 56261212 / 65536 = 858, (858 - 250) * 34 = 20672 -> 207.
        let bme = Bme680::with_calib(NullPort, CalibData::default());
        assert_eq!(bme.calc_res_heat(Celsius(320), Celsius(25)), 207);
        assert_eq!(
            bme.calc_res_heat(Celsius(900), Celsius(25)),
            bme.calc_res_heat(Celsius(400), Celsius(25))
        );
    }

    #[test]
    fn skipped_channels_stay_zero() {
        let bme = sensor();
        let field = FieldData::decode(&[
            0x80, 0x00, 0xE7, 0x43, 0x30, 0xE1, 0x00, 0x00, 0x2D, 0x00, 0, 0, 0, 0x96, 0x34,
        ]);
        let config = crate::ConfigBuilder::new()
            .hum_oversampling(Oversampling::Skipped)
            .gas_profile(None)
            .build();

        let m = bme.compensate_with(&field, &config);
        assert_eq!(m.temp, Temperature(2250));
        assert_eq!(m.pres, Pressure(101_325));
        assert_eq!(m.hum, Humidity(0));
        assert_eq!(m.gas, Gas(0));
    }
}
