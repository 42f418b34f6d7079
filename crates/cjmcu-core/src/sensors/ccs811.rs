//! CCS811 air quality sensor (eCO2 / TVOC)
//!
//! The CCS811 exposes its registers as "mailboxes": a mailbox is selected by
//! writing its one-byte address, and its contents are read back with a
//! separate read of the mailbox's fixed width. Writes carry the address
//! followed by the payload.
//!
//! Bring-up runs once in [`Ccs811::new`]:
//!
//! ```text
//! Opened -> IdVerified -> AppStarted -> ModeConfigured -> Measuring
//! ```
//!
//! Each step is fatal on failure. Afterwards [`Ccs811::read_sensors`] is
//! called once per polling tick; its failures are transient.
//!
//! Datasheet: <https://cdn.sparkfun.com/assets/learn_tutorials/1/4/3/CCS811_Datasheet-DS000459.pdf>

use core::fmt;
use core::str::FromStr;

use embedded_hal::delay::DelayNs;
use log::{debug, info, trace, warn};
use thiserror_no_std::Error;

use super::bus::{io_error, read_register};
use super::{AirQuality, EnvironmentCompensation, InitError, RegisterBus, Sensor, SensorError};

const SENSOR: &str = "CCS811";

const HARDWARE_ID: u8 = 0x81;
const APP_START: u8 = 0xF4;

const MAILBOX_SELECT_DELAY_US: u32 = 62_500;
const APP_START_DELAY_US: u32 = 62_500;
const MODE_SETTLE_DELAY_US: u32 = 15_000;
const RESULT_SETTLE_DELAY_US: u32 = 15_000;

const STATUS_ERROR: u8 = 0x01;
const STATUS_DATA_READY: u8 = 0x08;

/// Status byte echoed in the result mailbox when the data is valid
/// (firmware in application mode, app valid, data ready, optionally error).
const RESULT_STATUS_VALID: [u8; 2] = [0x98, 0x99];

/// Sensor resistance reached the top of its range. Data is still usable.
pub const ERROR_MAX_RESISTANCE: u8 = 0x08;

/// The chip occasionally sets bit 15 of its results.
const RESULT_VALUE_MASK: u16 = 0x7FFF;

const MAX_MAILBOX_LEN: usize = 8;

/// Contents of one mailbox read.
pub type MailboxData = heapless::Vec<u8, MAX_MAILBOX_LEN>;

/// Static description of one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxInfo {
    pub address: u8,
    pub size: usize,
    pub readable: bool,
    pub writeable: bool,
}

/// Logical mailbox names, indexing [`MAILBOXES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mailbox {
    Status,
    MeasMode,
    AlgResultData,
    RawData,
    EnvData,
    Ntc,
    Thresholds,
    Baseline,
    HwId,
    HwVersion,
    FwBootVersion,
    FwAppVersion,
    ErrorId,
    SwReset,
}

const fn mailbox(address: u8, size: usize, readable: bool, writeable: bool) -> MailboxInfo {
    MailboxInfo {
        address,
        size,
        readable,
        writeable,
    }
}

/// Mailbox table, in [`Mailbox`] declaration order.
pub const MAILBOXES: [MailboxInfo; 14] = [
    mailbox(0x00, 1, true, false),  // Status
    mailbox(0x01, 1, true, true),   // MeasMode
    mailbox(0x02, 8, true, false),  // AlgResultData
    mailbox(0x03, 2, true, false),  // RawData
    mailbox(0x05, 4, false, true),  // EnvData
    mailbox(0x06, 4, true, false),  // Ntc
    mailbox(0x10, 5, false, true),  // Thresholds
    mailbox(0x11, 2, true, true),   // Baseline
    mailbox(0x20, 1, true, false),  // HwId
    mailbox(0x21, 1, true, false),  // HwVersion
    mailbox(0x23, 2, true, false),  // FwBootVersion
    mailbox(0x24, 2, true, false),  // FwAppVersion
    mailbox(0xE0, 1, true, false),  // ErrorId
    mailbox(0xFF, 4, false, true),  // SwReset
];

impl Mailbox {
    #[inline]
    pub const fn info(self) -> MailboxInfo {
        MAILBOXES[self as usize]
    }
}

/// Drive mode, i.e. how often the chip produces a new sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementMode {
    /// Mode 1: constant power, every second
    ConstantPower,
    /// Mode 2: pulse heating, every 10 seconds
    #[default]
    PulseHeating,
    /// Mode 3: low power pulse heating, every 60 seconds
    LowPowerPulseHeating,
}

impl MeasurementMode {
    /// Value written to the MEAS_MODE mailbox.
    pub const fn register_value(self) -> u8 {
        match self {
            Self::ConstantPower => 0x10,
            Self::PulseHeating => 0x20,
            Self::LowPowerPulseHeating => 0x30,
        }
    }

    pub const fn interval_secs(self) -> u32 {
        match self {
            Self::ConstantPower => 1,
            Self::PulseHeating => 10,
            Self::LowPowerPulseHeating => 60,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown CCS811 measurement mode (expected constant, pulse, low-power or 1-3)")]
pub struct ParseModeError;

impl FromStr for MeasurementMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "constant" => Ok(Self::ConstantPower),
            "2" | "pulse" => Ok(Self::PulseHeating),
            "3" | "low-power" => Ok(Self::LowPowerPulseHeating),
            _ => Err(ParseModeError),
        }
    }
}

/// Bring-up progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ccs811State {
    Opened,
    IdVerified,
    AppStarted,
    ModeConfigured,
    Measuring,
}

/// Hardware and firmware versions, as reported by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub hardware: u8,
    pub boot: [u8; 2],
    pub application: [u8; 2],
}

impl fmt::Display for Versions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nibbles = |b: u8| (b >> 4, b & 0x0F);
        let (hw_major, hw_minor) = nibbles(self.hardware);
        let (boot_major, boot_minor) = nibbles(self.boot[0]);
        let (app_major, app_minor) = nibbles(self.application[0]);
        write!(
            f,
            "hardware {}.{}, boot {}.{}.{}, application {}.{}.{}",
            hw_major, hw_minor, boot_major, boot_minor, self.boot[1], app_major, app_minor, self.application[1]
        )
    }
}

/// Name of the lowest error bit set in an ERROR_ID value.
pub fn describe_error(code: u8) -> &'static str {
    const NAMES: [&str; 6] = [
        "invalid register write",
        "invalid register read",
        "invalid measurement mode",
        "sensor resistance out of range",
        "heater current out of range",
        "heater voltage not applied",
    ];
    NAMES
        .iter()
        .enumerate()
        .find(|&(bit, _)| code & (1 << bit) != 0)
        .map_or("unknown error", |(_, name)| *name)
}

/// Decode an ALG_RESULT_DATA mailbox.
///
/// Only the first six bytes are used: CO2 and TVOC big-endian, the echoed
/// status and the echoed error id.
pub fn decode_result(data: &[u8]) -> Result<AirQuality, SensorError> {
    let &[co2_hi, co2_lo, tvoc_hi, tvoc_lo, status, error, ..] = data else {
        return Err(SensorError::ShortRead {
            expected: 6,
            actual: data.len(),
        });
    };

    if !RESULT_STATUS_VALID.contains(&status) {
        debug!("CCS811: result not valid, status {:#04x}", status);
        return Err(SensorError::NotReady);
    }

    if error != 0 && error != ERROR_MAX_RESISTANCE {
        return Err(SensorError::DeviceError { code: error });
    }

    Ok(AirQuality {
        co2_ppm: u16::from_be_bytes([co2_hi, co2_lo]) & RESULT_VALUE_MASK,
        tvoc_ppb: u16::from_be_bytes([tvoc_hi, tvoc_lo]) & RESULT_VALUE_MASK,
    })
}

/// Encode one ENV_DATA field: unsigned, 1/512 resolution.
fn encode_env(value: f64) -> [u8; 2] {
    (libm::round(value * 512.0) as u16).to_be_bytes()
}

pub struct Ccs811<B, D> {
    bus: B,
    delay: D,
    mode: MeasurementMode,
    state: Ccs811State,
    co2: u16,
    tvoc: u16,
    baseline: Option<[u8; 2]>,
}

impl<B: RegisterBus, D: DelayNs> Ccs811<B, D> {
    /// Verify the chip, start its application firmware and configure `mode`.
    pub fn new(bus: B, delay: D, mode: MeasurementMode) -> Result<Self, InitError> {
        let mut sensor = Self {
            bus,
            delay,
            mode,
            state: Ccs811State::Opened,
            co2: 0,
            tvoc: 0,
            baseline: None,
        };
        sensor.init()?;
        Ok(sensor)
    }

    fn init(&mut self) -> Result<(), InitError> {
        debug!("CCS811: checking the hardware id");
        let id = self
            .read_mailbox(Mailbox::HwId, MAILBOX_SELECT_DELAY_US)
            .map_err(InitError::command(SENSOR, "read hardware id"))?;
        let found = id.first().copied().unwrap_or_default();
        if found != HARDWARE_ID {
            return Err(InitError::WrongIdentity {
                sensor: SENSOR,
                expected: HARDWARE_ID.into(),
                found: found.into(),
            });
        }
        self.advance(Ccs811State::IdVerified);

        self.write_raw(&[APP_START])
            .map_err(InitError::command(SENSOR, "start application"))?;
        self.delay.delay_us(APP_START_DELAY_US);
        self.advance(Ccs811State::AppStarted);

        self.write_mailbox(Mailbox::MeasMode, &[self.mode.register_value()])
            .map_err(InitError::command(SENSOR, "set measurement mode"))?;
        self.delay.delay_us(MODE_SETTLE_DELAY_US);
        self.advance(Ccs811State::ModeConfigured);

        info!(
            "CCS811: measuring in {:?} mode (every {} s)",
            self.mode,
            self.mode.interval_secs()
        );
        self.advance(Ccs811State::Measuring);
        Ok(())
    }

    fn advance(&mut self, state: Ccs811State) {
        trace!("CCS811: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Poll the chip and update CO2 / TVOC if a valid sample is ready.
    pub fn read_sensors(&mut self) -> Result<AirQuality, SensorError> {
        let status = self.read_mailbox(Mailbox::Status, MAILBOX_SELECT_DELAY_US)?;
        let status = status.first().copied().unwrap_or_default();

        if status & STATUS_DATA_READY == 0 {
            debug!("CCS811: no new samples ready, status {:#04x}", status);
            return Err(SensorError::NotReady);
        }

        if status & STATUS_ERROR != 0 {
            let error = self.read_mailbox(Mailbox::ErrorId, MAILBOX_SELECT_DELAY_US)?;
            let code = error.first().copied().unwrap_or_default();
            warn!(
                "CCS811: error flagged, status {:#04x}, error {:#04x} ({})",
                status,
                code,
                describe_error(code)
            );

            if code != ERROR_MAX_RESISTANCE {
                return Err(SensorError::DeviceError { code });
            }
            // The concurrent result is still valid; restore the last good baseline.
            if let Err(e) = self.write_baseline() {
                warn!("CCS811: unable to restore baseline: {}", e);
            }
        } else if let Err(e) = self.read_baseline() {
            warn!("CCS811: unable to read baseline: {}", e);
        }

        self.delay.delay_us(RESULT_SETTLE_DELAY_US);
        let data = self.read_mailbox(Mailbox::AlgResultData, MAILBOX_SELECT_DELAY_US)?;
        let reading = decode_result(&data)?;

        self.co2 = reading.co2_ppm;
        self.tvoc = reading.tvoc_ppb;
        Ok(reading)
    }

    /// Select `mailbox`, wait `settle_us`, and read its full width.
    pub fn read_mailbox(&mut self, mailbox: Mailbox, settle_us: u32) -> Result<MailboxData, SensorError> {
        let info = mailbox.info();
        if !info.readable {
            return Err(SensorError::AccessDenied {
                register: info.address,
            });
        }

        let mut buf = [0u8; MAX_MAILBOX_LEN];
        let buf = &mut buf[..info.size];
        read_register(&mut self.bus, &mut self.delay, info.address, settle_us, buf)?;
        trace!("CCS811: read {:?}: {:02x?}", mailbox, buf);
        Ok(buf.iter().copied().collect())
    }

    /// Write `payload` to `mailbox`, truncated to the mailbox width.
    pub fn write_mailbox(&mut self, mailbox: Mailbox, payload: &[u8]) -> Result<(), SensorError> {
        let info = mailbox.info();
        if !info.writeable {
            return Err(SensorError::AccessDenied {
                register: info.address,
            });
        }

        let len = payload.len().min(info.size);
        let mut frame = [0u8; MAX_MAILBOX_LEN + 1];
        frame[0] = info.address;
        frame[1..=len].copy_from_slice(&payload[..len]);
        self.write_raw(&frame[..=len])
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        trace!("CCS811: write {:02x?}", bytes);
        self.bus.write(bytes).map_err(io_error)
    }

    fn read_baseline(&mut self) -> Result<(), SensorError> {
        let data = self.read_mailbox(Mailbox::Baseline, MAILBOX_SELECT_DELAY_US)?;
        if let &[hi, lo] = data.as_slice() {
            self.baseline = Some([hi, lo]);
        }
        Ok(())
    }

    fn write_baseline(&mut self) -> Result<(), SensorError> {
        match self.baseline {
            Some(baseline) => self.write_mailbox(Mailbox::Baseline, &baseline),
            None => {
                debug!("CCS811: baseline not captured yet");
                Ok(())
            }
        }
    }

    /// Read hardware, bootloader and application versions.
    pub fn versions(&mut self) -> Result<Versions, SensorError> {
        let hardware = self.read_mailbox(Mailbox::HwVersion, MAILBOX_SELECT_DELAY_US)?;
        let boot = self.read_mailbox(Mailbox::FwBootVersion, MAILBOX_SELECT_DELAY_US)?;
        let application = self.read_mailbox(Mailbox::FwAppVersion, MAILBOX_SELECT_DELAY_US)?;
        let byte = |data: &MailboxData, i: usize| data.get(i).copied().unwrap_or_default();
        let pair = |data: &MailboxData| [byte(data, 0), byte(data, 1)];

        Ok(Versions {
            hardware: hardware.first().copied().unwrap_or_default(),
            boot: pair(&boot),
            application: pair(&application),
        })
    }

    /// Last published CO2 value in ppm.
    pub fn co2(&self) -> u16 {
        self.co2
    }

    /// Last published TVOC value in ppb.
    pub fn tvoc(&self) -> u16 {
        self.tvoc
    }

    /// Cached self-calibration baseline, if one was read back yet.
    pub fn baseline(&self) -> Option<u16> {
        self.baseline.map(u16::from_be_bytes)
    }

    /// Replace the cached baseline; it is written back on the next
    /// out-of-range resistance error.
    pub fn set_baseline(&mut self, baseline: u16) {
        self.baseline = Some(baseline.to_be_bytes());
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    pub fn state(&self) -> Ccs811State {
        self.state
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

impl<B: RegisterBus, D: DelayNs> Sensor for Ccs811<B, D> {
    type Reading = AirQuality;

    fn name(&self) -> &'static str {
        SENSOR
    }

    fn read(&mut self) -> Result<AirQuality, SensorError> {
        self.read_sensors()
    }
}

impl<B: RegisterBus, D: DelayNs> EnvironmentCompensation for Ccs811<B, D> {
    /// Humidity is sent as `%RH * 512`, temperature as `(°C + 25) * 512`.
    fn set_env_data(&mut self, humidity_percent: f64, temperature_celsius: f64) -> Result<(), SensorError> {
        let [rh_hi, rh_lo] = encode_env(humidity_percent);
        let [t_hi, t_lo] = encode_env(temperature_celsius + 25.0);
        self.write_mailbox(Mailbox::EnvData, &[rh_hi, rh_lo, t_hi, t_lo])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::{NoopDelay, Op, ScriptedBus};

    fn init_script() -> Vec<Op> {
        vec![
            Op::write([0x20]),
            Op::read([HARDWARE_ID]),
            Op::write([APP_START]),
            Op::write([0x01, 0x20]),
        ]
    }

    fn initialised(ops: impl IntoIterator<Item = Op>) -> Ccs811<ScriptedBus, NoopDelay> {
        let mut script = init_script();
        script.extend(ops);
        Ccs811::new(ScriptedBus::new(script), NoopDelay::default(), MeasurementMode::PulseHeating).unwrap()
    }

    fn status(value: u8) -> [Op; 2] {
        [Op::write([0x00]), Op::read([value])]
    }

    fn result(bytes: [u8; 8]) -> [Op; 2] {
        [Op::write([0x02]), Op::read(bytes)]
    }

    #[test]
    fn mailbox_table_matches_enum_order() {
        assert_eq!(Mailbox::Status.info().address, 0x00);
        assert_eq!(Mailbox::AlgResultData.info().size, 8);
        assert_eq!(Mailbox::Baseline.info(), mailbox(0x11, 2, true, true));
        assert_eq!(Mailbox::HwId.info().address, 0x20);
        assert_eq!(Mailbox::ErrorId.info().address, 0xE0);
        assert!(!Mailbox::EnvData.info().readable);
        assert!(MAILBOXES.iter().all(|m| m.size <= MAX_MAILBOX_LEN));
    }

    #[test]
    fn init_walks_the_startup_sequence() {
        let sensor = initialised([]);
        assert_eq!(sensor.state(), Ccs811State::Measuring);

        let (bus, delay) = sensor.release();
        bus.done();
        assert_eq!(
            delay.total_us(),
            u64::from(MAILBOX_SELECT_DELAY_US + APP_START_DELAY_US + MODE_SETTLE_DELAY_US)
        );
    }

    #[test]
    fn init_writes_the_selected_mode() {
        let bus = ScriptedBus::new([
            Op::write([0x20]),
            Op::read([HARDWARE_ID]),
            Op::write([APP_START]),
            Op::write([0x01, 0x30]),
        ]);
        let sensor = Ccs811::new(bus, NoopDelay::default(), MeasurementMode::LowPowerPulseHeating).unwrap();
        sensor.release().0.done();
    }

    #[test]
    fn init_rejects_foreign_chip() {
        let bus = ScriptedBus::new([Op::write([0x20]), Op::read([0x60])]);
        let err = Ccs811::new(bus, NoopDelay::default(), MeasurementMode::default())
            .err()
            .unwrap();

        assert_eq!(
            err,
            InitError::WrongIdentity {
                sensor: "CCS811",
                expected: 0x81,
                found: 0x60
            }
        );
    }

    #[test]
    fn init_fails_on_unreadable_id() {
        let bus = ScriptedBus::new([Op::write([0x20]), Op::Read(Vec::new())]);
        let err = Ccs811::new(bus, NoopDelay::default(), MeasurementMode::default())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            InitError::Command {
                operation: "read hardware id",
                error: SensorError::ShortRead { expected: 1, actual: 0 },
                ..
            }
        ));
    }

    #[test]
    fn init_fails_when_app_start_is_refused() {
        let bus = ScriptedBus::new([Op::write([0x20]), Op::read([HARDWARE_ID]), Op::WriteFail]);
        let err = Ccs811::new(bus, NoopDelay::default(), MeasurementMode::default())
            .err()
            .unwrap();

        assert!(matches!(err, InitError::Command { operation: "start application", .. }));
    }

    #[test]
    fn reads_a_valid_sample_and_caches_baseline() {
        let mut script = Vec::new();
        script.extend(status(0x98));
        script.extend([Op::write([0x11]), Op::read([0x84, 0x3C])]);
        script.extend(result([0x01, 0x90, 0x00, 0x20, 0x98, 0x00, 0x12, 0x34]));
        let mut sensor = initialised(script);

        let reading = sensor.read_sensors().unwrap();

        assert_eq!(reading, AirQuality { co2_ppm: 400, tvoc_ppb: 32 });
        assert_eq!(sensor.co2(), 400);
        assert_eq!(sensor.tvoc(), 32);
        assert_eq!(sensor.baseline(), Some(0x843C));
        sensor.release().0.done();
    }

    #[test]
    fn not_ready_leaves_values_untouched() {
        let mut sensor = initialised(status(0x90));

        assert_eq!(sensor.read_sensors(), Err(SensorError::NotReady));
        assert_eq!(sensor.co2(), 0);
        sensor.release().0.done();
    }

    #[test]
    fn masks_bit_fifteen() {
        let reading = decode_result(&[0x80, 0x64, 0x00, 0x32, 0x98, 0x00]).unwrap();
        assert_eq!(reading.co2_ppm, 0x0064);
        assert_eq!(reading.tvoc_ppb, 0x0032);

        let reading = decode_result(&[0x81, 0x00, 0x80, 0x32, 0x99, 0x00, 0, 0]).unwrap();
        assert_eq!(reading.co2_ppm, 0x0100);
        assert_eq!(reading.tvoc_ppb, 0x0032);
    }

    #[test]
    fn decode_rejects_invalid_status_and_errors() {
        assert_eq!(
            decode_result(&[0x01, 0x90, 0, 0, 0x10, 0x00]),
            Err(SensorError::NotReady)
        );
        assert_eq!(
            decode_result(&[0x01, 0x90, 0, 0, 0x98, 0x10]),
            Err(SensorError::DeviceError { code: 0x10 })
        );
        assert_eq!(
            decode_result(&[0x01, 0x90, 0, 0]),
            Err(SensorError::ShortRead { expected: 6, actual: 4 })
        );
    }

    #[test]
    fn max_resistance_still_updates_values() {
        let mut script = Vec::new();
        script.extend(status(0x99));
        script.extend([Op::write([0xE0]), Op::read([ERROR_MAX_RESISTANCE])]);
        // Cached baseline is written back before the result is read.
        script.push(Op::write([0x11, 0x84, 0x3C]));
        script.extend(result([0x02, 0x00, 0x00, 0x40, 0x99, ERROR_MAX_RESISTANCE, 0, 0]));
        let mut sensor = initialised(script);
        sensor.set_baseline(0x843C);

        let reading = sensor.read_sensors().unwrap();

        assert_eq!(reading, AirQuality { co2_ppm: 512, tvoc_ppb: 64 });
        assert_eq!(sensor.co2(), 512);
        sensor.release().0.done();
    }

    #[test]
    fn max_resistance_without_baseline_skips_the_write() {
        let mut script = Vec::new();
        script.extend(status(0x99));
        script.extend([Op::write([0xE0]), Op::read([ERROR_MAX_RESISTANCE])]);
        script.extend(result([0x02, 0x00, 0x00, 0x40, 0x99, 0x00, 0, 0]));
        let mut sensor = initialised(script);

        assert!(sensor.read_sensors().is_ok());
        sensor.release().0.done();
    }

    #[test]
    fn baseline_restore_failure_is_not_fatal() {
        let mut script = Vec::new();
        script.extend(status(0x99));
        script.extend([Op::write([0xE0]), Op::read([ERROR_MAX_RESISTANCE])]);
        script.push(Op::WriteFail);
        script.extend(result([0x02, 0x00, 0x00, 0x40, 0x98, 0x00, 0, 0]));
        let mut sensor = initialised(script);
        sensor.set_baseline(0x1234);

        assert_eq!(sensor.read_sensors().unwrap().co2_ppm, 512);
    }

    #[test]
    fn other_device_errors_abort_the_tick() {
        let mut script = Vec::new();
        script.extend(status(0x99));
        script.extend([Op::write([0xE0]), Op::read([0x10])]);
        let mut sensor = initialised(script);

        assert_eq!(sensor.read_sensors(), Err(SensorError::DeviceError { code: 0x10 }));
        assert_eq!(sensor.co2(), 0);
        sensor.release().0.done();
    }

    #[test]
    fn result_error_byte_outside_tolerated_set_is_rejected() {
        let mut script = Vec::new();
        script.extend(status(0x98));
        script.extend([Op::write([0x11]), Op::read([0x84, 0x3C])]);
        script.extend(result([0x01, 0x90, 0x00, 0x20, 0x98, 0x04, 0, 0]));
        let mut sensor = initialised(script);

        assert_eq!(sensor.read_sensors(), Err(SensorError::DeviceError { code: 0x04 }));
        assert_eq!(sensor.co2(), 0);
        assert_eq!(sensor.tvoc(), 0);
    }

    #[test]
    fn short_result_read_does_not_update() {
        let mut script = Vec::new();
        script.extend(status(0x98));
        script.extend([Op::write([0x11]), Op::read([0x84, 0x3C])]);
        script.extend([Op::write([0x02]), Op::read([0x01, 0x90, 0x00, 0x20, 0x98])]);
        let mut sensor = initialised(script);

        assert_eq!(
            sensor.read_sensors(),
            Err(SensorError::ShortRead { expected: 8, actual: 5 })
        );
        assert_eq!(sensor.co2(), 0);
        sensor.release().0.done();
    }

    #[test]
    fn baseline_read_failure_is_not_fatal() {
        let mut script = Vec::new();
        script.extend(status(0x98));
        script.extend([Op::write([0x11]), Op::read([0x84])]);
        script.extend(result([0x01, 0x90, 0x00, 0x20, 0x98, 0x00, 0, 0]));
        let mut sensor = initialised(script);

        assert_eq!(sensor.read_sensors().unwrap().co2_ppm, 400);
        assert_eq!(sensor.baseline(), None);
    }

    #[test]
    fn env_data_is_encoded_in_512ths() {
        let mut sensor = initialised([Op::write([0x05, 0x64, 0x00, 0x64, 0x00])]);

        sensor.set_env_data(50.0, 25.0).unwrap();
        sensor.release().0.done();
    }

    #[test]
    fn env_data_rounds_to_nearest() {
        // 42.3 * 512 = 21657.6 -> 21658; (21.7 + 25) * 512 = 23910.4 -> 23910
        let rh = 21658_u16.to_be_bytes();
        let t = 23910_u16.to_be_bytes();
        let mut sensor = initialised([Op::write([0x05, rh[0], rh[1], t[0], t[1]])]);

        sensor.set_env_data(42.3, 21.7).unwrap();
        sensor.release().0.done();
    }

    #[test]
    fn env_data_write_failure_is_reported() {
        let mut sensor = initialised([Op::WriteFail]);
        assert!(matches!(sensor.set_env_data(50.0, 25.0), Err(SensorError::Io(_))));
    }

    #[test]
    fn mailbox_access_is_checked_against_the_table() {
        let mut sensor = initialised([]);

        assert_eq!(
            sensor.read_mailbox(Mailbox::EnvData, 0),
            Err(SensorError::AccessDenied { register: 0x05 })
        );
        assert_eq!(
            sensor.write_mailbox(Mailbox::Status, &[0]),
            Err(SensorError::AccessDenied { register: 0x00 })
        );
    }

    #[test]
    fn reads_versions() {
        let mut sensor = initialised([
            Op::write([0x21]),
            Op::read([0x12]),
            Op::write([0x23]),
            Op::read([0x10, 0x00]),
            Op::write([0x24]),
            Op::read([0x20, 0x01]),
        ]);

        let versions = sensor.versions().unwrap();

        assert_eq!(versions.hardware, 0x12);
        assert_eq!(
            versions.to_string(),
            "hardware 1.2, boot 1.0.0, application 2.0.1"
        );
    }

    #[test]
    fn parses_modes() {
        assert_eq!("pulse".parse::<MeasurementMode>(), Ok(MeasurementMode::PulseHeating));
        assert_eq!("1".parse::<MeasurementMode>(), Ok(MeasurementMode::ConstantPower));
        assert_eq!(
            " low-power ".parse::<MeasurementMode>(),
            Ok(MeasurementMode::LowPowerPulseHeating)
        );
        assert_eq!("4".parse::<MeasurementMode>(), Err(ParseModeError));
    }

    #[test]
    fn describes_error_bits() {
        assert_eq!(describe_error(ERROR_MAX_RESISTANCE), "sensor resistance out of range");
        assert_eq!(describe_error(0x01), "invalid register write");
        assert_eq!(describe_error(0x00), "unknown error");
    }
}
