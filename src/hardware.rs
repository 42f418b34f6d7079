//! Hardware bring-up for the CJMCU-8128 on Linux
//!
//! Every sensor gets its own handle on the I2C character device, bound to
//! the sensor's address. Sensors are initialised in a fixed order and any
//! failure aborts startup.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use cjmcu_core::sensors::{Bmp280, Ccs811, Hdc1080, I2cDevice};
use cjmcu_core::{Station, TimeSource, Timestamp};
use linux_embedded_hal::{Delay, I2cdev};
use log::{error, info, warn};

use crate::config::{Config, I2cAddress};
use crate::error::AppError;

/// Wall clock in whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

pub type LinuxBus = I2cDevice<I2cdev>;

pub type LinuxStation =
    Station<Ccs811<LinuxBus, Delay>, Hdc1080<LinuxBus, Delay>, Bmp280<LinuxBus, Delay>, SystemClock>;

fn open_bus(path: &Path, address: I2cAddress) -> Result<LinuxBus, AppError> {
    let i2c = I2cdev::new(path).map_err(|e| {
        error!("Failed to open {}: {}", path.display(), e);
        AppError::BusOpen {
            path: path.display().to_string(),
            details: e.to_string(),
        }
    })?;
    Ok(I2cDevice::new(i2c, address.0))
}

/// Open and initialise all three sensors and build the station around them.
pub fn open_station(config: &Config) -> Result<LinuxStation, AppError> {
    let bus = config.i2c_bus.as_path();
    info!("Initialising sensors on {}", bus.display());

    let mut ccs811 = Ccs811::new(open_bus(bus, config.ccs811_address)?, Delay, config.ccs811_mode)?;
    match ccs811.versions() {
        Ok(versions) => info!("CCS811 ready: {}", versions),
        Err(e) => warn!("CCS811 ready, versions unavailable: {}", e),
    }

    let hdc1080 = Hdc1080::new(open_bus(bus, config.hdc1080_address)?, Delay)?;
    info!(
        "HDC1080 ready: manufacturer {:#06x}, device {:#06x}",
        hdc1080.manufacturer_id(),
        hdc1080.device_id()
    );

    let bmp280 = Bmp280::new(open_bus(bus, config.bmp280_address)?, Delay)?;
    info!("BMP280 ready");

    Ok(Station::new(
        ccs811,
        hdc1080,
        bmp280,
        SystemClock,
        config.filter_settings(),
    ))
}
