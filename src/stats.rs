//! Sample statistics accumulators.
//!
//! `MinMaxAvg` is the O(1)-per-sample accumulator behind the monitor's stats
//! topic; `WindowedStats` adds the time window, `OnlineStats` adds Welford
//! variance and RMS for callers that want more than min/avg/max.

use serde::{Deserialize, Serialize};

use crate::time::TimeRep;

/// A sample value the accumulators can ingest.
///
/// Implemented for the primitive numeric types. Float NaN samples are skipped
/// silently, matching the accumulator's "never poison the window" contract.
pub trait Sample: Copy + PartialOrd + Default + Send + Sync + 'static {
    /// Widens the sample for sum/average arithmetic.
    fn to_f64(self) -> f64;

    /// True when the sample must be ignored (float NaN).
    fn is_invalid(self) -> bool {
        false
    }
}

macro_rules! impl_sample_int {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_sample_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn is_invalid(self) -> bool {
        self.is_nan()
    }
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn is_invalid(self) -> bool {
        self.is_nan()
    }
}

/// Snapshot of an accumulation window, published on a monitor's stats topic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats<T> {
    /// Smallest sample in the window.
    pub min: T,
    /// Largest sample in the window.
    pub max: T,
    /// Arithmetic mean of the window.
    pub avg: f64,
    /// Number of samples accumulated.
    pub count: u32,
}

/// Running min/max/average accumulator.
///
/// O(1) per sample, no allocation. `min`/`max` are `None` until the first
/// valid sample arrives.
#[derive(Debug, Clone, Default)]
pub struct MinMaxAvg<T> {
    count: u32,
    sum: f64,
    extrema: Option<(T, T)>,
}

impl<T: Sample> MinMaxAvg<T> {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            extrema: None,
        }
    }

    /// Clears all accumulated state.
    pub fn reset(&mut self) {
        self.count = 0;
        self.sum = 0.0;
        self.extrema = None;
    }

    /// Adds one sample. NaN float samples are skipped.
    pub fn add(&mut self, v: T) {
        if v.is_invalid() {
            return;
        }

        self.extrema = Some(match self.extrema {
            None => (v, v),
            Some((min, max)) => (
                if v < min { v } else { min },
                if v > max { v } else { max },
            ),
        });
        self.sum += v.to_f64();
        self.count += 1;
    }

    /// Adds a slice of samples.
    pub fn add_many(&mut self, data: &[T]) {
        for &v in data {
            self.add(v);
        }
    }

    /// True when at least one sample has been accumulated.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Number of accumulated samples.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Sum of all samples.
    #[must_use]
    pub const fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of all samples, 0 when empty.
    #[must_use]
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }

    /// Smallest sample seen.
    #[must_use]
    pub fn min(&self) -> Option<T> {
        self.extrema.map(|(min, _)| min)
    }

    /// Largest sample seen.
    #[must_use]
    pub fn max(&self) -> Option<T> {
        self.extrema.map(|(_, max)| max)
    }

    /// Largest absolute extremum, 0 when empty.
    #[must_use]
    pub fn peak_abs(&self) -> f64 {
        self.extrema.map_or(0.0, |(min, max)| {
            max.to_f64().abs().max(min.to_f64().abs())
        })
    }

    /// max - min, 0 when empty.
    #[must_use]
    pub fn peak_to_peak(&self) -> f64 {
        self.extrema
            .map_or(0.0, |(min, max)| max.to_f64() - min.to_f64())
    }

    /// Midpoint between min and max, 0 when empty.
    #[must_use]
    pub fn mid_range(&self) -> f64 {
        self.extrema
            .map_or(0.0, |(min, max)| (max.to_f64() + min.to_f64()) / 2.0)
    }

    /// Snapshot of the current window, `None` when empty.
    #[must_use]
    pub fn snapshot(&self) -> Option<Stats<T>> {
        self.extrema.map(|(min, max)| Stats {
            min,
            max,
            avg: self.avg(),
            count: self.count,
        })
    }
}

/// Min/avg/max accumulation over a fixed time window.
///
/// The window opens at the first sample after a reset; [`WindowedStats::add`]
/// reports when the window has elapsed so the owner can publish the snapshot
/// and reset.
#[derive(Debug, Clone)]
pub struct WindowedStats<T, R: TimeRep> {
    window: R,
    opened_at: Option<R>,
    acc: MinMaxAvg<T>,
}

impl<T: Sample, R: TimeRep> WindowedStats<T, R> {
    /// Creates an accumulator over windows of length `window`.
    #[must_use]
    pub fn new(window: R) -> Self {
        Self {
            window,
            opened_at: None,
            acc: MinMaxAvg::new(),
        }
    }

    /// Adds a sample at time `now`; returns true once the window has elapsed.
    ///
    /// The caller is expected to read [`WindowedStats::snapshot`] and then
    /// [`WindowedStats::reset`] when this returns true.
    pub fn add(&mut self, v: T, now: R) -> bool {
        let opened_at = *self.opened_at.get_or_insert(now);
        self.acc.add(v);
        R::elapsed(now, opened_at) >= self.window
    }

    /// Snapshot of the current window, `None` when empty.
    #[must_use]
    pub fn snapshot(&self) -> Option<Stats<T>> {
        self.acc.snapshot()
    }

    /// Closes the window: clears samples and the window start time.
    pub fn reset(&mut self) {
        self.opened_at = None;
        self.acc.reset();
    }

    /// The configured window length.
    #[must_use]
    pub const fn window(&self) -> R {
        self.window
    }

    /// The underlying accumulator.
    #[must_use]
    pub const fn accumulator(&self) -> &MinMaxAvg<T> {
        &self.acc
    }
}

/// Extended accumulator: Welford mean/variance, RMS, peak deviation.
#[derive(Debug, Clone, Default)]
pub struct OnlineStats<T> {
    acc: MinMaxAvg<T>,
    mean: f64,
    m2: f64,
    sum_squares: f64,
    peak_from_mean: f64,
}

impl<T: Sample> OnlineStats<T> {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            acc: MinMaxAvg::new(),
            mean: 0.0,
            m2: 0.0,
            sum_squares: 0.0,
            peak_from_mean: 0.0,
        }
    }

    /// Adds one sample. NaN float samples are skipped.
    pub fn add(&mut self, v: T) {
        if v.is_invalid() {
            return;
        }
        self.acc.add(v);

        let x = v.to_f64();

        // Welford's algorithm.
        let delta = x - self.mean;
        self.mean += delta / f64::from(self.acc.count());
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;

        self.sum_squares += x * x;

        let deviation = (x - self.mean).abs();
        if deviation > self.peak_from_mean {
            self.peak_from_mean = deviation;
        }
    }

    /// Clears all accumulated state.
    pub fn reset(&mut self) {
        self.acc.reset();
        self.mean = 0.0;
        self.m2 = 0.0;
        self.sum_squares = 0.0;
        self.peak_from_mean = 0.0;
    }

    /// Number of accumulated samples.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.acc.count()
    }

    /// Mean of all samples.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// True once variance is defined (at least two samples).
    #[must_use]
    pub const fn has_variance(&self) -> bool {
        self.acc.count() > 1
    }

    /// Sample variance (n - 1), 0 with fewer than two samples.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.has_variance() {
            self.m2 / f64::from(self.acc.count() - 1)
        } else {
            0.0
        }
    }

    /// Sample standard deviation.
    #[must_use]
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Root mean square of all samples.
    #[must_use]
    pub fn rms(&self) -> f64 {
        if self.acc.has_data() {
            (self.sum_squares / f64::from(self.acc.count())).sqrt()
        } else {
            0.0
        }
    }

    /// Largest absolute deviation from the running mean.
    #[must_use]
    pub const fn peak_from_mean(&self) -> f64 {
        self.peak_from_mean
    }

    /// The min/max/avg accumulator backing this one.
    #[must_use]
    pub const fn min_max_avg(&self) -> &MinMaxAvg<T> {
        &self.acc
    }
}
