//! BMP280 barometric pressure and temperature sensor
//!
//! The chip is run in forced mode: every [`Bmp280::measure`] starts exactly
//! one conversion, waits for it and reads the 20-bit raw values. Raw values
//! are turned into °C and Pa with the floating point compensation formulas
//! from the Bosch datasheet (section 8.1), using the factory calibration read
//! once during initialisation.
//!
//! The BME280 is register compatible for temperature and pressure and is
//! accepted as well.

use embedded_hal::delay::DelayNs;
use log::{debug, info, trace};

use super::bus::{io_error, read_register};
use super::{Barometric, InitError, RegisterBus, Sensor, SensorError};

const SENSOR: &str = "BMP280";

const CHIP_ID_BMP280: u8 = 0x58;
const CHIP_ID_BME280: u8 = 0x60;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESSURE_MSB: u8 = 0xF7;

/// Temperature oversampling x1, pressure x4, forced mode.
const CTRL_MEAS_FORCED: u8 = 0b001_011_01;
/// No IIR filter; standby time is unused in forced mode.
const CONFIG_DEFAULT: u8 = 0x00;

/// Worst case conversion time for the oversampling above is 13.3 ms.
const CONVERSION_DELAY_US: u32 = 15_000;

/// Raw value reported for a skipped conversion.
const ADC_SKIPPED: i32 = 0x80000;

/// Factory trimming parameters (`dig_T1` .. `dig_P9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    pub const SIZE: usize = 24;

    /// Decode the little-endian block starting at register 0x88.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let u = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Temperature in °C plus the fine temperature the pressure formula needs.
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = f64::from(adc_t);
        let t1 = f64::from(self.t1);

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.t2);
        let dt = adc_t / 131072.0 - t1 / 8192.0;
        let var2 = dt * dt * f64::from(self.t3);
        let t_fine = var1 + var2;

        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa, or `None` if the calibration makes the formula undefined.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return None;
        }

        let mut p = 1048576.0 - f64::from(adc_p);
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = f64::from(self.p9) * p * p / 2147483648.0;
        let var2 = p * f64::from(self.p8) / 32768.0;
        Some(p + (var1 + var2 + f64::from(self.p7)) / 16.0)
    }
}

/// Split the six data registers into raw pressure and temperature.
fn decode_adc(data: &[u8; 6]) -> (i32, i32) {
    let adc = |msb: u8, lsb: u8, xlsb: u8| (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4);
    (adc(data[0], data[1], data[2]), adc(data[3], data[4], data[5]))
}

pub struct Bmp280<B, D> {
    bus: B,
    delay: D,
    chip_id: u8,
    calibration: Calibration,
    temperature: f64,
    pressure: f64,
}

impl<B: RegisterBus, D: DelayNs> Bmp280<B, D> {
    /// Verify the chip id, read the calibration block and configure the chip.
    pub fn new(bus: B, delay: D) -> Result<Self, InitError> {
        let mut sensor = Self {
            bus,
            delay,
            chip_id: 0,
            calibration: Calibration::default(),
            temperature: 0.0,
            pressure: 0.0,
        };

        let mut id = [0u8; 1];
        sensor
            .read_into(REG_CHIP_ID, &mut id)
            .map_err(InitError::command(SENSOR, "read chip id"))?;
        let [chip_id] = id;
        if chip_id != CHIP_ID_BMP280 && chip_id != CHIP_ID_BME280 {
            return Err(InitError::WrongIdentity {
                sensor: SENSOR,
                expected: CHIP_ID_BMP280.into(),
                found: chip_id.into(),
            });
        }
        sensor.chip_id = chip_id;

        let mut block = [0u8; Calibration::SIZE];
        sensor
            .read_into(REG_CALIBRATION, &mut block)
            .map_err(InitError::command(SENSOR, "read calibration"))?;
        sensor.calibration = Calibration::from_bytes(&block);
        debug!("BMP280: {:?}", sensor.calibration);

        sensor
            .write(&[REG_CONFIG, CONFIG_DEFAULT])
            .map_err(InitError::command(SENSOR, "write config"))?;

        info!("BMP280: initialised, chip id {:#04x}", chip_id);
        Ok(sensor)
    }

    fn read_into(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        read_register(&mut self.bus, &mut self.delay, register, 0, buf)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        trace!("BMP280: write {:02x?}", bytes);
        self.bus.write(bytes).map_err(io_error)
    }

    /// Run one forced conversion and update the cached values.
    pub fn measure(&mut self) -> Result<Barometric, SensorError> {
        self.write(&[REG_CTRL_MEAS, CTRL_MEAS_FORCED])?;
        self.delay.delay_us(CONVERSION_DELAY_US);

        let mut data = [0u8; 6];
        self.read_into(REG_PRESSURE_MSB, &mut data)?;
        let (adc_p, adc_t) = decode_adc(&data);
        trace!("BMP280: adc_p {} adc_t {}", adc_p, adc_t);
        if adc_p == ADC_SKIPPED || adc_t == ADC_SKIPPED {
            return Err(SensorError::NotReady);
        }

        let (temperature, t_fine) = self.calibration.compensate_temperature(adc_t);
        let pressure = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or(SensorError::NotReady)?;

        self.temperature = temperature;
        self.pressure = pressure / 100.0;
        Ok(Barometric {
            temperature_celsius: self.temperature,
            pressure_hpa: self.pressure,
        })
    }

    /// Temperature in °C from the last successful conversion.
    pub fn get_temperature(&self) -> f64 {
        self.temperature
    }

    /// Pressure in hPa from the last successful conversion.
    pub fn get_pressure(&self) -> f64 {
        self.pressure
    }

    pub fn chip_id(&self) -> u8 {
        self.chip_id
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

impl<B: RegisterBus, D: DelayNs> Sensor for Bmp280<B, D> {
    type Reading = Barometric;

    fn name(&self) -> &'static str {
        SENSOR
    }

    fn read(&mut self) -> Result<Barometric, SensorError> {
        self.measure()
    }
}
