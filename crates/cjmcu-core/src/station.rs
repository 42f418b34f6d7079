//! Measurement orchestrator
//!
//! [`Station`] owns the three sensor drivers, runs one measurement cycle per
//! call to [`Station::measure`], feeds every reading through its own
//! [`StatefulValue`] and publishes the filtered values as a [`Snapshot`].
//!
//! A failed read is logged and skipped; the snapshot keeps the last accepted
//! value for that sensor. Once both climate sensors have produced a reading,
//! the air quality sensor is fed humidity and the mean temperature after
//! every cycle so it can compensate its output.

use log::{debug, info, warn};

use crate::filter::{DEFAULT_INIT_DURATION_SECS, Numeric, StatefulValue};
use crate::sensors::{AirQuality, Barometric, Climate, EnvironmentCompensation, Sensor, SensorError};
use crate::snapshot::Snapshot;
use crate::time::{TimeSource, Timestamp};

/// Filter tuning for every measured quantity. Zero tolerance accepts everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub co2_tolerance: u16,
    pub tvoc_tolerance: u16,
    pub humidity_tolerance: f64,
    pub temperature_tolerance: f64,
    pub pressure_tolerance: f64,
    /// Re-initialise a filter that rejected everything for this long (seconds)
    pub reset_after_secs: u64,
    /// Length of the accept-everything phase after startup (seconds)
    pub init_duration_secs: u64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            co2_tolerance: 400,
            tvoc_tolerance: 300,
            humidity_tolerance: 10.0,
            temperature_tolerance: 5.0,
            pressure_tolerance: 10.0,
            reset_after_secs: 1800,
            init_duration_secs: DEFAULT_INIT_DURATION_SECS,
        }
    }
}

/// Read statistics for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorHealth {
    /// When the sensor last produced a reading
    pub last_success: Option<Timestamp>,
    /// Failed reads since the last success
    pub consecutive_failures: u32,
}

impl SensorHealth {
    fn record_success(&mut self, now: Timestamp) {
        self.last_success = Some(now);
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn has_reported(&self) -> bool {
        self.last_success.is_some()
    }
}

/// Health of all three sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StationHealth {
    pub ccs811: SensorHealth,
    pub hdc1080: SensorHealth,
    pub bmp280: SensorHealth,
}

/// Take one reading and account for it. Failures are logged here.
fn poll<S: Sensor>(sensor: &mut S, health: &mut SensorHealth, now: Timestamp) -> Option<S::Reading> {
    match sensor.read() {
        Ok(reading) => {
            health.record_success(now);
            Some(reading)
        }
        Err(SensorError::NotReady) => {
            debug!("{}: no new sample this cycle", sensor.name());
            None
        }
        Err(e) => {
            health.record_failure();
            warn!(
                "{}: read failed ({} in a row): {}",
                sensor.name(),
                health.consecutive_failures,
                e
            );
            None
        }
    }
}

fn filter<T: Numeric, C: TimeSource + Clone>(tolerance: T, clock: &C, settings: &FilterSettings) -> StatefulValue<T, C> {
    StatefulValue::new(tolerance, clock.clone())
        .with_reset_after(settings.reset_after_secs)
        .with_init_duration(settings.init_duration_secs)
}

pub struct Station<A, H, P, C> {
    ccs811: A,
    hdc1080: H,
    bmp280: P,
    clock: C,
    co2: StatefulValue<u16, C>,
    tvoc: StatefulValue<u16, C>,
    humidity: StatefulValue<f64, C>,
    temperature_hdc1080: StatefulValue<f64, C>,
    temperature_bmp280: StatefulValue<f64, C>,
    pressure: StatefulValue<f64, C>,
    health: StationHealth,
    snapshot: Snapshot,
}

impl<A, H, P, C> Station<A, H, P, C>
where
    A: Sensor<Reading = AirQuality> + EnvironmentCompensation,
    H: Sensor<Reading = Climate>,
    P: Sensor<Reading = Barometric>,
    C: TimeSource + Clone,
{
    pub fn new(ccs811: A, hdc1080: H, bmp280: P, clock: C, settings: FilterSettings) -> Self {
        let snapshot = Snapshot::new(clock.now());
        info!("station started at {}", snapshot.server_start);

        Self {
            co2: filter(settings.co2_tolerance, &clock, &settings),
            tvoc: filter(settings.tvoc_tolerance, &clock, &settings),
            humidity: filter(settings.humidity_tolerance, &clock, &settings),
            temperature_hdc1080: filter(settings.temperature_tolerance, &clock, &settings),
            temperature_bmp280: filter(settings.temperature_tolerance, &clock, &settings),
            pressure: filter(settings.pressure_tolerance, &clock, &settings),
            ccs811,
            hdc1080,
            bmp280,
            clock,
            health: StationHealth::default(),
            snapshot,
        }
    }

    /// Run one measurement cycle and return the updated snapshot.
    pub fn measure(&mut self) -> &Snapshot {
        let now = self.clock.now();

        if let Some(reading) = poll(&mut self.bmp280, &mut self.health.bmp280, now) {
            self.temperature_bmp280.set(reading.temperature_celsius);
            self.pressure.set(reading.pressure_hpa);
        }
        if let Some(reading) = poll(&mut self.ccs811, &mut self.health.ccs811, now) {
            self.co2.set(reading.co2_ppm);
            self.tvoc.set(reading.tvoc_ppb);
        }
        if let Some(reading) = poll(&mut self.hdc1080, &mut self.health.hdc1080, now) {
            self.humidity.set(reading.humidity_percent);
            self.temperature_hdc1080.set(reading.temperature_celsius);
        }

        let snapshot = &mut self.snapshot;
        snapshot.time = now;
        snapshot.co2 = self.co2.get();
        snapshot.tvoc = self.tvoc.get();
        snapshot.humidity = self.humidity.get();
        snapshot.temperature_hdc1080 = self.temperature_hdc1080.get();
        snapshot.temperature_bmp280 = self.temperature_bmp280.get();
        snapshot.pressure = self.pressure.get();
        debug!("measured {:?}", self.snapshot);

        if self.health.hdc1080.has_reported() && self.health.bmp280.has_reported() {
            let humidity = self.snapshot.humidity;
            let temperature = self.snapshot.mean_temperature();
            if let Err(e) = self.ccs811.set_env_data(humidity, temperature) {
                warn!("{}: unable to set environment data: {}", self.ccs811.name(), e);
            }
        }

        &self.snapshot
    }

    /// Snapshot from the last cycle, without measuring.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn health(&self) -> &StationHealth {
        &self.health
    }

    /// Force every filter back into its initialisation phase.
    pub fn reset_filters(&mut self) {
        info!("re-initialising all filters");
        self.co2.reset();
        self.tvoc.reset();
        self.humidity.reset();
        self.temperature_hdc1080.reset();
        self.temperature_bmp280.reset();
        self.pressure.reset();
    }
}
