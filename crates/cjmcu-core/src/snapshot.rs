//! Measurement snapshot exchanged between the daemon and its clients.
//!
//! Binary format (little-endian, 56 bytes):
//! - server_start: 8 bytes (u64)
//! - time: 8 bytes (u64)
//! - co2: 2 bytes (u16)
//! - tvoc: 2 bytes (u16)
//! - padding: 4 bytes
//! - humidity: 8 bytes (f64)
//! - temperature_hdc1080: 8 bytes (f64)
//! - temperature_bmp280: 8 bytes (f64)
//! - pressure: 8 bytes (f64)

use crate::time::Timestamp;

/// Size of [`Snapshot`] on the wire.
pub const SNAPSHOT_LEN: usize = 56;

/// Filtered values of all sensors at one point in time.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// When the daemon started (seconds since epoch)
    pub server_start: Timestamp,
    /// When the values were measured, zero before the first measurement
    pub time: Timestamp,
    /// Equivalent CO2 in ppm
    pub co2: u16,
    /// Total VOC in ppb
    pub tvoc: u16,
    /// Padding to keep the floats 8-byte aligned
    _padding: [u8; 4],
    /// Relative humidity in %
    pub humidity: f64,
    /// Temperature from the humidity sensor in °C
    pub temperature_hdc1080: f64,
    /// Temperature from the pressure sensor in °C
    pub temperature_bmp280: f64,
    /// Barometric pressure in hPa
    pub pressure: f64,
}

impl Snapshot {
    /// Empty snapshot for a daemon started at `server_start`.
    pub fn new(server_start: Timestamp) -> Self {
        Self {
            server_start,
            time: 0,
            co2: 0,
            tvoc: 0,
            _padding: [0; 4],
            humidity: 0.0,
            temperature_hdc1080: 0.0,
            temperature_bmp280: 0.0,
            pressure: 0.0,
        }
    }

    /// Returns the size of this structure in bytes (56).
    pub const fn size() -> usize {
        core::mem::size_of::<Self>()
    }

    /// `true` until the first measurement was stored.
    pub fn is_empty(&self) -> bool {
        self.time == 0
    }

    /// Seconds since the values were measured.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.time)
    }

    /// Mean of both temperature sensors.
    pub fn mean_temperature(&self) -> f64 {
        (self.temperature_hdc1080 + self.temperature_bmp280) / 2.0
    }

    /// Converts the snapshot to its wire representation.
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_LEN] {
        let mut bytes = [0u8; SNAPSHOT_LEN];

        bytes[0..8].copy_from_slice(&self.server_start.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.time.to_le_bytes());
        bytes[16..18].copy_from_slice(&self.co2.to_le_bytes());
        bytes[18..20].copy_from_slice(&self.tvoc.to_le_bytes());
        // 20..24 is padding, already zero

        let floats = [
            self.humidity,
            self.temperature_hdc1080,
            self.temperature_bmp280,
            self.pressure,
        ];
        for (i, value) in floats.iter().enumerate() {
            let offset = 24 + i * 8;
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }

        bytes
    }

    /// Creates a snapshot from its wire representation.
    pub fn from_bytes(bytes: &[u8; SNAPSHOT_LEN]) -> Self {
        let u64_at = |offset: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(word)
        };
        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let f64_at = |offset: usize| f64::from_bits(u64_at(offset));

        Self {
            server_start: u64_at(0),
            time: u64_at(8),
            co2: u16_at(16),
            tvoc: u16_at(18),
            _padding: [0; 4],
            humidity: f64_at(24),
            temperature_hdc1080: f64_at(32),
            temperature_bmp280: f64_at(40),
            pressure: f64_at(48),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            time: 1_700_000_030,
            co2: 612,
            tvoc: 48,
            humidity: 41.25,
            temperature_hdc1080: 22.5,
            temperature_bmp280: 23.5,
            pressure: 1006.53,
            ..Snapshot::new(1_700_000_000)
        }
    }

    #[test]
    fn test_snapshot_size() {
        assert_eq!(Snapshot::size(), SNAPSHOT_LEN, "Snapshot must match the wire layout");
    }

    #[test]
    fn test_snapshot_layout() {
        let bytes = sample().to_bytes();

        assert_eq!(&bytes[0..8], &1_700_000_000_u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &1_700_000_030_u64.to_le_bytes());
        assert_eq!(&bytes[16..20], &[0x64, 0x02, 0x30, 0x00]);
        assert_eq!(&bytes[20..24], &[0; 4]);
        assert_eq!(&bytes[24..32], &41.25_f64.to_le_bytes());
        assert_eq!(&bytes[48..56], &1006.53_f64.to_le_bytes());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = sample();
        let deserialized = Snapshot::from_bytes(&snapshot.to_bytes());
        assert_eq!(snapshot, deserialized);
    }

    #[test]
    fn test_padding_is_ignored_on_read() {
        let mut bytes = sample().to_bytes();
        bytes[20..24].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        assert_eq!(Snapshot::from_bytes(&bytes), sample());
    }

    #[test]
    fn test_age_and_mean() {
        let snapshot = sample();

        assert_eq!(snapshot.age(1_700_000_060), 30);
        assert_eq!(snapshot.age(0), 0);
        assert_eq!(snapshot.mean_temperature(), 23.0);
        assert!(!snapshot.is_empty());
        assert!(Snapshot::new(5).is_empty());
    }
}
