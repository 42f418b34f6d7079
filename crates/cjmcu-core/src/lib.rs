//! Hardware-independent core library for cjmcu-rs
//!
//! This crate contains the platform-agnostic parts of the CJMCU-8128 air
//! quality daemon: the stateful value filter, the CCS811 / HDC1080 / BMP280
//! register protocols, the measurement orchestrator and the snapshot record
//! served to clients.
//!
//! It is `#![no_std]` unless the `std` feature is enabled, so the drivers can
//! run on any `embedded-hal` 1.0 bus and are tested on the host against
//! scripted buses.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod filter;
pub mod sensors;
pub mod snapshot;
pub mod station;
pub mod time;

pub use filter::{Numeric, StatefulValue};
pub use snapshot::{SNAPSHOT_LEN, Snapshot};
pub use station::{FilterSettings, SensorHealth, Station, StationHealth};
pub use time::{TimeSource, Timestamp};
