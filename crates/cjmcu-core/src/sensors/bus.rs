//! Register bus used by the drivers
//!
//! The chips in this project are driven the same way: write a register
//! address (optionally followed by a payload), wait, then read the register
//! contents back in a separate transaction. [`RegisterBus`] captures exactly
//! that, and reports how many bytes a read actually produced so the drivers
//! can reject short reads.
//!
//! [`I2cDevice`] binds any blocking `embedded-hal` I2C bus to one address.
//!
//! # Example
//!
//! ```rust,ignore
//! use cjmcu_core::sensors::{I2cDevice, RegisterBus};
//!
//! let mut ccs811 = I2cDevice::new(open(), 0x5a);
//! ccs811.write(&[0x20])?;
//! let mut id = [0u8; 1];
//! let read = ccs811.read(&mut id)?;
//! ```

use embedded_hal::i2c::{Error, I2c, SevenBitAddress};

use super::SensorError;

/// Byte-oriented access to one device on a bus.
pub trait RegisterBus {
    type Error: Error;

    /// Write `bytes` in a single transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes and return how many arrived.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Blocking I2C bus bound to a fixed 7-bit device address.
pub struct I2cDevice<I> {
    i2c: I,
    address: SevenBitAddress,
}

impl<I> I2cDevice<I> {
    #[inline]
    pub const fn new(i2c: I, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    #[inline]
    pub const fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cDevice<I> {
    type Error = I::Error;

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(self.address, bytes)
    }

    /// `embedded-hal` reads either fill the buffer or fail.
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.i2c.read(self.address, buf)?;
        Ok(buf.len())
    }
}

pub(crate) fn io_error<E: Error>(error: E) -> SensorError {
    SensorError::Io(error.kind())
}

/// Select `register`, wait `settle_us`, then read exactly `buf.len()` bytes.
pub(crate) fn read_register<B, D>(
    bus: &mut B,
    delay: &mut D,
    register: u8,
    settle_us: u32,
    buf: &mut [u8],
) -> Result<(), SensorError>
where
    B: RegisterBus,
    D: embedded_hal::delay::DelayNs,
{
    bus.write(&[register]).map_err(io_error)?;
    if settle_us > 0 {
        delay.delay_us(settle_us);
    }
    let actual = bus.read(buf).map_err(io_error)?;
    if actual != buf.len() {
        return Err(SensorError::ShortRead {
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}
