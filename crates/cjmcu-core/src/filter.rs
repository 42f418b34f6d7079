//! Stateful value filter
//!
//! [`StatefulValue`] turns a noisy stream of samples into a stable output.
//! A new sample is accepted when it lies within `tolerance` of the last
//! accepted value; otherwise it is silently dropped and [`StatefulValue::get`]
//! keeps returning the previous value.
//!
//! Two phases bypass the tolerance check:
//!
//! - **Initialisation**: starting with the first [`StatefulValue::set`] call and
//!   lasting `init_duration` seconds, every sample is accepted. The call that
//!   crosses the deadline is still accepted; only later calls are checked.
//! - **Timeout recovery**: if `reset_after` is non-zero and no sample was
//!   accepted for longer than `reset_after` seconds, the filter re-enters
//!   initialisation. This follows a true value that jumped and stayed there.
//!
//! ```rust,ignore
//! let mut co2 = StatefulValue::new(400_u16, SystemClock).with_reset_after(1800);
//! co2.set(612);
//! assert_eq!(co2.get(), 612);
//! ```

use core::fmt::Debug;

use log::{debug, trace};

use crate::time::{TimeSource, Timestamp};

/// Default length of the initialisation phase in seconds.
pub const DEFAULT_INIT_DURATION_SECS: u64 = 300;

/// Arithmetic the filter needs from a sample type.
///
/// Implemented for all primitive integers and floats. Unsigned types are
/// supported because the distance is computed without going negative.
pub trait Numeric: Copy + PartialOrd + Default + Debug {
    /// Absolute difference between two values.
    fn distance(self, other: Self) -> Self;

    /// `true` when the value equals zero.
    fn is_zero(self) -> bool;
}

macro_rules! impl_numeric_int {
    ($($t:ty),*) => {
        $(
            impl Numeric for $t {
                #[inline]
                fn distance(self, other: Self) -> Self {
                    if self > other {
                        self.saturating_sub(other)
                    } else {
                        other.saturating_sub(self)
                    }
                }

                #[inline]
                fn is_zero(self) -> bool {
                    self == 0
                }
            }
        )*
    };
}

macro_rules! impl_numeric_float {
    ($($t:ty),*) => {
        $(
            impl Numeric for $t {
                #[inline]
                fn distance(self, other: Self) -> Self {
                    if self > other { self - other } else { other - self }
                }

                #[inline]
                fn is_zero(self) -> bool {
                    self == 0.0
                }
            }
        )*
    };
}

impl_numeric_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_numeric_float!(f32, f64);

/// Scalar value with outlier rejection and automatic re-initialisation.
pub struct StatefulValue<T, C> {
    /// Last accepted value
    current: T,
    /// Last value given to `set`, accepted or not
    previous: T,
    current_time: Timestamp,
    previous_time: Timestamp,
    /// Zero accepts everything
    tolerance: T,
    init_duration: u64,
    init_started_at: Option<Timestamp>,
    initializing: bool,
    /// Zero disables timeout recovery
    reset_after: u64,
    clock: C,
}

impl<T: Numeric, C: TimeSource> StatefulValue<T, C> {
    /// Create a filter in the initialising state.
    ///
    /// Timeout recovery is disabled and the initialisation phase lasts
    /// [`DEFAULT_INIT_DURATION_SECS`].
    pub fn new(tolerance: T, clock: C) -> Self {
        Self {
            current: T::default(),
            previous: T::default(),
            current_time: 0,
            previous_time: 0,
            tolerance,
            init_duration: DEFAULT_INIT_DURATION_SECS,
            init_started_at: None,
            initializing: true,
            reset_after: 0,
            clock,
        }
    }

    /// Re-enter initialisation when nothing was accepted for `secs` seconds.
    pub fn with_reset_after(mut self, secs: u64) -> Self {
        self.reset_after = secs;
        self
    }

    /// Length of the initialisation phase in seconds.
    pub fn with_init_duration(mut self, secs: u64) -> Self {
        self.init_duration = secs;
        self
    }

    /// Offer a new sample.
    pub fn set(&mut self, x: T) {
        let now = self.clock.now();

        let unconditional = if self.initializing {
            match self.init_started_at {
                None => {
                    self.init_started_at = Some(now);
                    debug!("filter startup at {}: tolerance {:?}", now, self.tolerance);
                }
                Some(started) if now.saturating_sub(started) >= self.init_duration => {
                    self.initializing = false;
                    debug!(
                        "filter initialised: current {:?}/{} previous {:?}/{}",
                        self.current, self.current_time, self.previous, self.previous_time
                    );
                }
                Some(_) => {}
            }
            true
        } else if self.reset_after > 0
            && now.saturating_sub(self.current_time) > self.reset_after
        {
            self.initializing = true;
            self.init_started_at = Some(now);
            debug!(
                "filter timed out: last accepted {:?} at {}, re-initialising",
                self.current, self.current_time
            );
            true
        } else {
            false
        };

        trace!(
            "filter set {:?} at {}: current {:?}/{} previous {:?}/{}",
            x, now, self.current, self.current_time, self.previous, self.previous_time
        );

        self.previous = x;
        self.previous_time = now;

        if unconditional
            || self.tolerance.is_zero()
            || x.distance(self.current) <= self.tolerance
        {
            self.current = x;
            self.current_time = now;
        }
    }

    /// Last accepted value.
    #[inline]
    pub fn get(&self) -> T {
        self.current
    }

    /// Force the filter back into initialisation, starting now.
    pub fn reset(&mut self) {
        self.initializing = true;
        self.init_started_at = Some(self.clock.now());
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Last raw sample, whether or not it was accepted.
    pub fn previous(&self) -> T {
        self.previous
    }

    /// When the current value was accepted.
    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn previous_time(&self) -> Timestamp {
        self.previous_time
    }

    pub fn tolerance(&self) -> T {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::manual::ManualClock;
    use proptest::prelude::*;

    const START: Timestamp = 1_700_000_000;

    fn filter(tolerance: i32, clock: &ManualClock) -> StatefulValue<i32, ManualClock> {
        StatefulValue::new(tolerance, clock.clone())
    }

    #[test]
    fn first_sample_is_always_accepted() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock);

        value.set(1_000_000);

        assert_eq!(value.get(), 1_000_000);
        assert_eq!(value.previous(), 1_000_000);
        assert_eq!(value.current_time(), START);
        assert!(value.is_initializing());
    }

    #[test]
    fn accepts_everything_during_initialisation() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock);

        value.set(10);
        clock.advance(100);
        value.set(500);
        assert_eq!(value.get(), 500);

        clock.advance(100);
        value.set(-40);
        assert_eq!(value.get(), -40);
    }

    #[test]
    fn call_crossing_the_deadline_is_accepted() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock);

        value.set(10);
        clock.advance(DEFAULT_INIT_DURATION_SECS);
        value.set(900);

        assert_eq!(value.get(), 900);
        assert!(!value.is_initializing());

        // From here on the tolerance applies.
        clock.advance(1);
        value.set(100);
        assert_eq!(value.get(), 900);
        assert_eq!(value.previous(), 100);
    }

    #[test]
    fn rejects_outliers_in_steady_state() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock).with_init_duration(0);

        value.set(20);
        clock.advance(1);
        value.set(20); // leaves initialisation
        assert!(!value.is_initializing());

        clock.advance(10);
        value.set(25);
        assert_eq!(value.get(), 25, "boundary is inclusive");
        assert_eq!(value.current_time(), START + 11);

        clock.advance(10);
        value.set(31);
        assert_eq!(value.get(), 25);
        assert_eq!(value.current_time(), START + 11);
        assert_eq!(value.previous(), 31);
        assert_eq!(value.previous_time(), START + 21);
    }

    #[test]
    fn zero_tolerance_accepts_everything() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(0, &clock).with_init_duration(0);

        value.set(1);
        value.set(2);
        assert!(!value.is_initializing());

        value.set(10_000);
        assert_eq!(value.get(), 10_000);
    }

    #[test]
    fn unsigned_values_do_not_underflow() {
        let clock = ManualClock::starting_at(START);
        let mut co2 = StatefulValue::new(100_u16, clock.clone()).with_init_duration(0);

        co2.set(400);
        co2.set(400);
        co2.set(350);
        assert_eq!(co2.get(), 350);

        co2.set(10);
        assert_eq!(co2.get(), 350);
    }

    #[test]
    fn floats_use_inclusive_boundary() {
        let clock = ManualClock::starting_at(START);
        let mut humidity = StatefulValue::new(2.5_f64, clock.clone()).with_init_duration(0);

        humidity.set(40.0);
        humidity.set(40.0);
        humidity.set(42.5);
        assert_eq!(humidity.get(), 42.5);

        humidity.set(45.5);
        assert_eq!(humidity.get(), 42.5);
    }

    #[test]
    fn prolonged_rejection_reinitialises() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock).with_init_duration(0).with_reset_after(60);

        value.set(20);
        value.set(20);
        assert!(!value.is_initializing());

        // A real jump: rejected until the timeout elapses.
        clock.advance(30);
        value.set(80);
        assert_eq!(value.get(), 20);

        clock.advance(30);
        value.set(80);
        assert_eq!(value.get(), 20, "exactly the timeout is not yet exceeded");

        clock.advance(1);
        value.set(81);
        assert_eq!(value.get(), 81);
        assert!(value.is_initializing());
    }

    #[test]
    fn timeout_recovery_disabled_by_default() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock).with_init_duration(0);

        value.set(20);
        value.set(20);
        clock.advance(1_000_000);
        value.set(80);

        assert_eq!(value.get(), 20);
    }

    #[test]
    fn reset_restarts_initialisation() {
        let clock = ManualClock::starting_at(START);
        let mut value = filter(5, &clock).with_init_duration(120);

        value.set(20);
        clock.advance(120);
        value.set(20);
        assert!(!value.is_initializing());

        value.reset();
        assert!(value.is_initializing());

        clock.advance(60);
        value.set(500);
        assert_eq!(value.get(), 500);

        clock.advance(60);
        value.set(20); // crosses the new deadline, still accepted
        assert_eq!(value.get(), 20);

        value.set(500);
        assert_eq!(value.get(), 20);
    }

    #[test]
    fn get_before_any_sample_is_zero() {
        let clock = ManualClock::starting_at(START);
        let value = StatefulValue::new(1.0_f64, clock);
        assert_eq!(value.get(), 0.0);
    }

    proptest! {
        #[test]
        fn steady_state_output_moves_within_tolerance(
            tolerance in 1_i32..50,
            samples in proptest::collection::vec((-1000_i32..1000, 0_u64..120), 1..200),
        ) {
            let clock = ManualClock::starting_at(START);
            let mut value = filter(tolerance, &clock).with_init_duration(0);

            value.set(0);
            value.set(0);
            prop_assert!(!value.is_initializing());

            let mut last = value.get();
            for (sample, dt) in samples {
                clock.advance(dt);
                value.set(sample);
                let now = value.get();
                prop_assert!((now - last).abs() <= tolerance);
                prop_assert!(now == last || now == sample);
                last = now;
            }
        }

        #[test]
        fn first_sample_wins_regardless_of_magnitude(x in any::<i64>(), tolerance in 0_i64..10) {
            let clock = ManualClock::starting_at(START);
            let mut value = StatefulValue::new(tolerance, clock);
            value.set(x);
            prop_assert_eq!(value.get(), x);
        }
    }
}
