//! Runtime configuration
//!
//! Everything is read from `CJMCU_*` environment variables and every value
//! has a default matching the CJMCU-8128 board on a Raspberry Pi.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cjmcu_core::FilterSettings;
use cjmcu_core::sensors::MeasurementMode;
use envconfig::Envconfig;
use thiserror_no_std::Error;

/// 7-bit I2C address, parsed from decimal or `0x` prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cAddress(pub u8);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid 7-bit I2C address: {0:?}")]
pub struct InvalidAddress(String);

impl FromStr for I2cAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse(),
        };
        match parsed {
            Ok(address) if address <= 0x7F => Ok(Self(address)),
            _ => Err(InvalidAddress(s.to_owned())),
        }
    }
}

#[derive(Envconfig, Debug, Clone)]
pub struct Config {
    #[envconfig(from = "CJMCU_I2C_BUS", default = "/dev/i2c-1")]
    pub i2c_bus: PathBuf,

    #[envconfig(from = "CJMCU_CCS811_ADDRESS", default = "0x5a")]
    pub ccs811_address: I2cAddress,

    #[envconfig(from = "CJMCU_HDC1080_ADDRESS", default = "0x40")]
    pub hdc1080_address: I2cAddress,

    #[envconfig(from = "CJMCU_BMP280_ADDRESS", default = "0x76")]
    pub bmp280_address: I2cAddress,

    #[envconfig(from = "CJMCU_SOCKET", default = "/tmp/cjmcu-8128")]
    pub socket: PathBuf,

    /// The CCS811 needs at least ~20 s between reads in pulse mode.
    #[envconfig(from = "CJMCU_MEASURE_INTERVAL_SECS", default = "30")]
    pub measure_interval_secs: u64,

    #[envconfig(from = "CJMCU_CCS811_MODE", default = "pulse")]
    pub ccs811_mode: MeasurementMode,

    #[envconfig(from = "CJMCU_CO2_TOLERANCE", default = "400")]
    pub co2_tolerance: u16,

    #[envconfig(from = "CJMCU_TVOC_TOLERANCE", default = "300")]
    pub tvoc_tolerance: u16,

    #[envconfig(from = "CJMCU_HUMIDITY_TOLERANCE", default = "10")]
    pub humidity_tolerance: f64,

    #[envconfig(from = "CJMCU_TEMPERATURE_TOLERANCE", default = "5")]
    pub temperature_tolerance: f64,

    #[envconfig(from = "CJMCU_PRESSURE_TOLERANCE", default = "10")]
    pub pressure_tolerance: f64,

    #[envconfig(from = "CJMCU_FILTER_RESET_SECS", default = "1800")]
    pub filter_reset_secs: u64,

    #[envconfig(from = "CJMCU_FILTER_INIT_SECS", default = "300")]
    pub filter_init_secs: u64,
}

impl Config {
    /// Interval between measurements, never shorter than one second.
    pub fn measure_interval(&self) -> Duration {
        Duration::from_secs(self.measure_interval_secs.max(1))
    }

    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            co2_tolerance: self.co2_tolerance,
            tvoc_tolerance: self.tvoc_tolerance,
            humidity_tolerance: self.humidity_tolerance,
            temperature_tolerance: self.temperature_tolerance,
            pressure_tolerance: self.pressure_tolerance,
            reset_after_secs: self.filter_reset_secs,
            init_duration_secs: self.filter_init_secs,
        }
    }
}
