//! Time representations for debounce timers and statistics windows.
//!
//! The crate never reads a clock on its own: every `update`/`step` call takes
//! the current time from the caller, in whatever representation the caller's
//! time source produces. Two families are supported:
//!
//! - floating-point seconds (`f32`, `f64`)
//! - monotonically increasing unsigned tick counters (`u32`, `u64`), where
//!   elapsed time is computed with wrapping subtraction so a counter rollover
//!   does not corrupt pending timers

use std::time::Instant;

/// A time representation usable for debounce delays and window lengths.
///
/// `elapsed` must be correct in the representation's own wraparound
/// semantics: ordinary subtraction for floating-point seconds, modular
/// subtraction for unsigned tick counters.
pub trait TimeRep: Copy + PartialOrd + Send + Sync + 'static {
    /// The zero duration/instant of this representation.
    const ZERO: Self;

    /// Time elapsed from `since` to `now`.
    fn elapsed(now: Self, since: Self) -> Self;
}

impl TimeRep for f32 {
    const ZERO: Self = 0.0;

    fn elapsed(now: Self, since: Self) -> Self {
        now - since
    }
}

impl TimeRep for f64 {
    const ZERO: Self = 0.0;

    fn elapsed(now: Self, since: Self) -> Self {
        now - since
    }
}

impl TimeRep for u32 {
    const ZERO: Self = 0;

    fn elapsed(now: Self, since: Self) -> Self {
        now.wrapping_sub(since)
    }
}

impl TimeRep for u64 {
    const ZERO: Self = 0;

    fn elapsed(now: Self, since: Self) -> Self {
        now.wrapping_sub(since)
    }
}

/// Monotonic seconds-since-creation clock backed by [`std::time::Instant`].
///
/// A ready-made time source for hosts where `std` is available; targets with
/// their own tick counter feed raw `u32`/`u64` ticks instead.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero point is "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock was created.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    /// Seconds elapsed since the clock was created, single precision.
    #[must_use]
    pub fn now_f32(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
