//! Monotonic time source
//!
//! Every wait in the OSD drivers is a bounded poll against a [`Deadline`].
//! There is no sleeping and no blocking primitive; a caller that polls
//! simply stops once the deadline has passed.

/// Monotonic microsecond clock
///
/// Must never go backwards. Wrap-around is not handled; a `u64` of
/// microseconds outlives any flight.
pub trait MonotonicClock {
    /// Current time in microseconds
    fn now_us(&self) -> u64;

    /// Current time in milliseconds
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Point in time after which a wait is abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    at_us: u64,
}

impl Deadline {
    /// Deadline at an absolute clock value
    pub const fn at_us(at_us: u64) -> Self {
        Self { at_us }
    }

    /// Deadline `ms` milliseconds from now
    pub fn after_ms<C: MonotonicClock + ?Sized>(clock: &C, ms: u32) -> Self {
        Self::after_us(clock, ms as u64 * 1000)
    }

    /// Deadline `us` microseconds from now
    pub fn after_us<C: MonotonicClock + ?Sized>(clock: &C, us: u64) -> Self {
        Self {
            at_us: clock.now_us().saturating_add(us),
        }
    }

    /// Absolute expiry time in microseconds
    pub const fn as_us(&self) -> u64 {
        self.at_us
    }

    /// Check whether the deadline has passed
    pub fn expired<C: MonotonicClock + ?Sized>(&self, clock: &C) -> bool {
        clock.now_us() >= self.at_us
    }

    /// Microseconds left before expiry (zero once expired)
    pub fn remaining_us<C: MonotonicClock + ?Sized>(&self, clock: &C) -> u64 {
        self.at_us.saturating_sub(clock.now_us())
    }
}

/// Clock backed by the embassy time driver
#[cfg(feature = "embassy-time")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl MonotonicClock for EmbassyClock {
    fn now_us(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }
}
