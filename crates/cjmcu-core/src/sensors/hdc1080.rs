//! HDC1080 humidity and temperature sensor
//!
//! All registers are 16 bits wide, big-endian. A conversion is started by
//! writing the temperature (or humidity) register address; the result is
//! read back after the conversion time without sending another address.
//! With the acquisition-mode bit set, one trigger on the temperature
//! register yields temperature followed by humidity (4 bytes).

use embedded_hal::delay::DelayNs;
use log::{debug, info, trace};

use super::bus::{io_error, read_register};
use super::{Climate, InitError, RegisterBus, Sensor, SensorError};

const SENSOR: &str = "HDC1080";

const MANUFACTURER_ID: u16 = 0x5449;
const DEVICE_ID: u16 = 0x1050;

const REG_TEMPERATURE: u8 = 0x00;
const REG_HUMIDITY: u8 = 0x01;
const REG_CONFIG: u8 = 0x02;
const REG_SERIAL: [u8; 3] = [0xFB, 0xFC, 0xFD];
const REG_MANUFACTURER_ID: u8 = 0xFE;
const REG_DEVICE_ID: u8 = 0xFF;

const CONFIG_RESET: u16 = 0x8000;
const CONFIG_HEATER: u16 = 0x2000;
const CONFIG_ACQUISITION_BOTH: u16 = 0x1000;
const CONFIG_TEMPERATURE_RES: u16 = 0x0400;
const CONFIG_HUMIDITY_RES: u16 = 0x0300;

const REGISTER_DELAY_US: u32 = 62_500;
const CONFIG_WRITE_DELAY_US: u32 = 15_000;

/// Temperature conversion resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureResolution {
    Bits11,
    Bits14,
}

/// Humidity conversion resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidityResolution {
    Bits8,
    Bits11,
    Bits14,
}

impl TemperatureResolution {
    const fn config_bits(self) -> u16 {
        match self {
            Self::Bits11 => 0x0400,
            Self::Bits14 => 0x0000,
        }
    }
}

impl HumidityResolution {
    const fn config_bits(self) -> u16 {
        match self {
            Self::Bits8 => 0x0200,
            Self::Bits11 => 0x0100,
            Self::Bits14 => 0x0000,
        }
    }
}

/// Bring-up progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hdc1080State {
    Opened,
    Reset,
    IdVerified,
    Configured,
    Measuring,
}

/// Convert a raw temperature register value to °C.
pub fn temperature_from_raw(raw: u16) -> f64 {
    f64::from(raw) * 165.0 / 65536.0 - 40.0
}

/// Convert a raw humidity register value to %RH.
pub fn humidity_from_raw(raw: u16) -> f64 {
    f64::from(raw) * 100.0 / 65536.0
}

pub struct Hdc1080<B, D> {
    bus: B,
    delay: D,
    state: Hdc1080State,
    serial_number: u64,
    recent_temperature: f64,
    recent_humidity: f64,
}

impl<B: RegisterBus, D: DelayNs> Hdc1080<B, D> {
    /// Reset the chip, verify its identity and configure 11-bit conversions
    /// with the heater off.
    pub fn new(bus: B, delay: D) -> Result<Self, InitError> {
        let mut sensor = Self {
            bus,
            delay,
            state: Hdc1080State::Opened,
            serial_number: 0,
            recent_temperature: 0.0,
            recent_humidity: 0.0,
        };
        sensor.init()?;
        Ok(sensor)
    }

    fn init(&mut self) -> Result<(), InitError> {
        self.update_config(|config| config | CONFIG_RESET)
            .map_err(InitError::command(SENSOR, "soft reset"))?;
        self.advance(Hdc1080State::Reset);

        self.verify_identity(REG_MANUFACTURER_ID, MANUFACTURER_ID, "read manufacturer id")?;
        self.verify_identity(REG_DEVICE_ID, DEVICE_ID, "read device id")?;
        self.advance(Hdc1080State::IdVerified);

        let mut serial = 0u64;
        for register in REG_SERIAL {
            let word = self
                .read_u16(register)
                .map_err(InitError::command(SENSOR, "read serial number"))?;
            serial = (serial << 16) | u64::from(word);
        }
        self.serial_number = serial;

        self.heater_off()
            .map_err(InitError::command(SENSOR, "disable heater"))?;
        self.set_resolution(TemperatureResolution::Bits11, HumidityResolution::Bits11)
            .map_err(InitError::command(SENSOR, "set resolution"))?;
        self.advance(Hdc1080State::Configured);

        info!("HDC1080: initialised, serial {:#014x}", self.serial_number);
        self.advance(Hdc1080State::Measuring);
        Ok(())
    }

    fn advance(&mut self, state: Hdc1080State) {
        trace!("HDC1080: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn verify_identity(&mut self, register: u8, expected: u16, operation: &'static str) -> Result<(), InitError> {
        let found = self
            .read_u16(register)
            .map_err(InitError::command(SENSOR, operation))?;
        if found != expected {
            return Err(InitError::WrongIdentity {
                sensor: SENSOR,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        read_register(&mut self.bus, &mut self.delay, register, REGISTER_DELAY_US, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Current configuration register.
    pub fn config(&mut self) -> Result<u16, SensorError> {
        self.read_u16(REG_CONFIG)
    }

    /// Only the upper byte of the configuration register is writeable.
    fn write_config(&mut self, config: u16) -> Result<(), SensorError> {
        let [msb, _] = config.to_be_bytes();
        trace!("HDC1080: config <- {:#06x}", config);
        self.bus
            .write(&[REG_CONFIG, msb, 0x00])
            .map_err(io_error)?;
        self.delay.delay_us(CONFIG_WRITE_DELAY_US);
        Ok(())
    }

    fn update_config(&mut self, f: impl FnOnce(u16) -> u16) -> Result<(), SensorError> {
        let config = self.config()?;
        self.write_config(f(config))
    }

    pub fn heater_on(&mut self) -> Result<(), SensorError> {
        self.update_config(|config| config | CONFIG_HEATER)
    }

    pub fn heater_off(&mut self) -> Result<(), SensorError> {
        self.update_config(|config| config & !CONFIG_HEATER)
    }

    pub fn set_resolution(
        &mut self,
        temperature: TemperatureResolution,
        humidity: HumidityResolution,
    ) -> Result<(), SensorError> {
        debug!("HDC1080: resolution {:?}/{:?}", temperature, humidity);
        self.update_config(|config| {
            (config & !(CONFIG_TEMPERATURE_RES | CONFIG_HUMIDITY_RES))
                | temperature.config_bits()
                | humidity.config_bits()
        })
    }

    /// Select single (`false`) or combined (`true`) acquisition.
    fn set_acquisition(&mut self, both: bool) -> Result<(), SensorError> {
        self.update_config(|config| {
            if both {
                config | CONFIG_ACQUISITION_BOTH
            } else {
                config & !CONFIG_ACQUISITION_BOTH
            }
        })
    }

    /// Trigger a temperature-only conversion.
    pub fn measure_temperature(&mut self) -> Result<f64, SensorError> {
        self.set_acquisition(false)?;
        let raw = self.read_u16(REG_TEMPERATURE)?;
        self.recent_temperature = temperature_from_raw(raw);
        Ok(self.recent_temperature)
    }

    /// Trigger a humidity-only conversion.
    pub fn measure_humidity(&mut self) -> Result<f64, SensorError> {
        self.set_acquisition(false)?;
        let raw = self.read_u16(REG_HUMIDITY)?;
        self.recent_humidity = humidity_from_raw(raw);
        Ok(self.recent_humidity)
    }

    /// Trigger one combined temperature and humidity conversion.
    pub fn measure(&mut self) -> Result<Climate, SensorError> {
        self.set_acquisition(true)?;

        let mut buf = [0u8; 4];
        read_register(&mut self.bus, &mut self.delay, REG_TEMPERATURE, REGISTER_DELAY_US, &mut buf)?;
        let [t_hi, t_lo, h_hi, h_lo] = buf;

        self.recent_temperature = temperature_from_raw(u16::from_be_bytes([t_hi, t_lo]));
        self.recent_humidity = humidity_from_raw(u16::from_be_bytes([h_hi, h_lo]));
        Ok(Climate {
            temperature_celsius: self.recent_temperature,
            humidity_percent: self.recent_humidity,
        })
    }

    /// Temperature from the last successful conversion, without touching the bus.
    pub fn recent_temperature(&self) -> f64 {
        self.recent_temperature
    }

    /// Humidity from the last successful conversion, without touching the bus.
    pub fn recent_humidity(&self) -> f64 {
        self.recent_humidity
    }

    pub fn manufacturer_id(&self) -> u16 {
        MANUFACTURER_ID
    }

    pub fn device_id(&self) -> u16 {
        DEVICE_ID
    }

    /// 48-bit serial number read during initialisation.
    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    pub fn state(&self) -> Hdc1080State {
        self.state
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

impl<B: RegisterBus, D: DelayNs> Sensor for Hdc1080<B, D> {
    type Reading = Climate;

    fn name(&self) -> &'static str {
        SENSOR
    }

    fn read(&mut self) -> Result<Climate, SensorError> {
        self.measure()
    }
}
