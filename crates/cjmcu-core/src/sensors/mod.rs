//! Sensor drivers and the traits the orchestrator drives them through
//!
//! Every driver talks to its chip through a [`RegisterBus`] bound to one I2C
//! address and blocks on an [`embedded_hal::delay::DelayNs`] for the fixed
//! settle times its protocol requires.
//!
//! Errors come in two flavours:
//!
//! - [`InitError`] is returned from a driver constructor and is fatal: the
//!   chip is missing, is the wrong chip, or refused its startup sequence.
//! - [`SensorError`] is returned from a steady-state read and is transient:
//!   the caller logs it, keeps the last known values and retries on the next
//!   polling tick.

pub mod bmp280;
pub mod bus;
pub mod ccs811;
pub mod hdc1080;

#[cfg(test)]
pub(crate) mod mock;

pub use bmp280::Bmp280;
pub use bus::{I2cDevice, RegisterBus};
pub use ccs811::{Ccs811, MeasurementMode};
pub use hdc1080::Hdc1080;

use embedded_hal::i2c::ErrorKind;
use thiserror_no_std::Error;

/// Transient failure of a single read. Measurements keep their last values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No new sample is available yet; try again next tick.
    #[error("no new sample ready")]
    NotReady,
    /// The chip flagged an error outside the tolerated set.
    #[error("device reported error code {code:#04x}")]
    DeviceError { code: u8 },
    /// Fewer bytes arrived than the register holds.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    /// The bus transaction itself failed.
    #[error("bus I/O failure: {0:?}")]
    Io(ErrorKind),
    /// The register does not permit the requested access.
    #[error("register {register:#04x} does not permit this access")]
    AccessDenied { register: u8 },
}

/// Fatal failure while bringing a sensor up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// Something else answers on the sensor's address.
    #[error("{sensor}: unexpected identity {found:#06x} (expected {expected:#06x})")]
    WrongIdentity {
        sensor: &'static str,
        expected: u16,
        found: u16,
    },
    /// A mandatory startup transaction failed.
    #[error("{sensor}: {operation} failed: {error}")]
    Command {
        sensor: &'static str,
        operation: &'static str,
        error: SensorError,
    },
}

impl InitError {
    pub(crate) fn command(sensor: &'static str, operation: &'static str) -> impl FnOnce(SensorError) -> Self {
        move |error| Self::Command {
            sensor,
            operation,
            error,
        }
    }
}

/// CO2 and VOC concentrations from the air quality sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AirQuality {
    /// Equivalent CO2 in ppm
    pub co2_ppm: u16,
    /// Total volatile organic compounds in ppb
    pub tvoc_ppb: u16,
}

/// Temperature and relative humidity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Climate {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
}

/// Temperature and barometric pressure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Barometric {
    pub temperature_celsius: f64,
    pub pressure_hpa: f64,
}

/// A sensor the orchestrator polls once per tick.
pub trait Sensor {
    /// The typed reading one poll produces.
    type Reading: Copy;

    /// Short chip name used in log records.
    fn name(&self) -> &'static str;

    /// Take one reading. A failure leaves the driver's cached values unchanged.
    fn read(&mut self) -> Result<Self::Reading, SensorError>;
}

/// Sensors whose output depends on ambient humidity and temperature.
pub trait EnvironmentCompensation {
    /// Feed the current relative humidity (%) and temperature (°C).
    fn set_env_data(&mut self, humidity_percent: f64, temperature_celsius: f64) -> Result<(), SensorError>;
}
