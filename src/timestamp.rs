//! Windows FILETIME handling for archive timestamps.
//!
//! 7z stores creation, access and modification times as Windows FILETIME
//! values: 100-nanosecond intervals since 1601-01-01 UTC.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch.
const EPOCH_DELTA_SECS: u64 = 11_644_473_600;

/// Number of 100ns FILETIME ticks per second.
const TICKS_PER_SEC: u64 = 10_000_000;

/// A timestamp as stored in a 7z archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from a raw FILETIME value.
    pub fn from_filetime(filetime: u64) -> Self {
        Self(filetime)
    }

    /// Returns the raw FILETIME value.
    pub fn as_filetime(&self) -> u64 {
        self.0
    }

    /// Converts to a `SystemTime`.
    ///
    /// FILETIME values before the Unix epoch map to times before
    /// `UNIX_EPOCH`; the conversion is exact to 100ns.
    pub fn as_system_time(&self) -> SystemTime {
        let secs = self.0 / TICKS_PER_SEC;
        let nanos = (self.0 % TICKS_PER_SEC) * 100;

        if secs >= EPOCH_DELTA_SECS {
            UNIX_EPOCH + Duration::new(secs - EPOCH_DELTA_SECS, nanos as u32)
        } else {
            UNIX_EPOCH - Duration::new(EPOCH_DELTA_SECS - secs, 0) + Duration::from_nanos(nanos)
        }
    }

    /// Returns seconds since the Unix epoch, negative for earlier times.
    pub fn unix_seconds(&self) -> i64 {
        (self.0 / TICKS_PER_SEC) as i64 - EPOCH_DELTA_SECS as i64
    }
}

impl From<u64> for Timestamp {
    fn from(filetime: u64) -> Self {
        Self::from_filetime(filetime)
    }
}
