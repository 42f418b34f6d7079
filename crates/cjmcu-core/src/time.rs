//! Time source abstraction
//!
//! The filter and the orchestrator only ever need "seconds since the Unix
//! epoch". Keeping that behind a trait lets the binary use the system clock
//! while tests drive time by hand.

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Source of wall-clock time in whole seconds.
pub trait TimeSource {
    /// Current time in seconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
