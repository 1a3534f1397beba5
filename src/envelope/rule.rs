//! Envelope rule kinds.
//!
//! Each rule is an immediate threshold condition composed with a
//! [`Debounce`] stage. The kinds form a closed set (tagged enum), so rules
//! can be inspected and serialized without any runtime type machinery.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::debounce::Debounce;
use crate::time::TimeRep;

/// Threshold-edge comparison policy, chosen at rule construction.
///
/// `Inclusive` (the default) accepts the threshold value itself: `Above`
/// violates only for `v > hi`. `Exclusive` makes the edge value violate:
/// `Above` violates for `v >= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Normal side uses `<=` / `>=`: the threshold value is acceptable.
    #[default]
    Inclusive,
    /// Normal side uses `<` / `>`: the threshold value violates.
    Exclusive,
}

impl Boundary {
    fn below_ok<T: PartialOrd>(self, v: &T, hi: &T) -> bool {
        match self {
            Self::Inclusive => v <= hi,
            Self::Exclusive => v < hi,
        }
    }

    fn above_ok<T: PartialOrd>(self, v: &T, lo: &T) -> bool {
        match self {
            Self::Inclusive => v >= lo,
            Self::Exclusive => v > lo,
        }
    }

    fn inside_ok<T: PartialOrd>(self, v: &T, lo: &T, hi: &T) -> bool {
        self.above_ok(v, lo) && self.below_ok(v, hi)
    }
}

/// Threshold configuration of a rule: the closed set of rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Limits<T> {
    /// Violation when the value exceeds `hi`.
    Above {
        /// Upper bound (max acceptable).
        hi: T,
    },
    /// Violation when the value falls below `lo`.
    Below {
        /// Lower bound (min acceptable).
        lo: T,
    },
    /// Keep the value within `[lo, hi]`; violation outside the band.
    Within {
        /// Lower edge of the allowed band.
        lo: T,
        /// Upper edge of the allowed band.
        hi: T,
    },
    /// Keep the value outside `[lo, hi]`; violation inside the forbidden band.
    Outside {
        /// Lower edge of the forbidden band.
        lo: T,
        /// Upper edge of the forbidden band.
        hi: T,
    },
    /// `Within` with separate enter/exit bands.
    ///
    /// Normal while inside the inner `[lo_exit, hi_exit]` band; violation
    /// starts only by leaving the outer `[lo_enter, hi_enter]` band, and
    /// clears only by returning inside the inner band.
    WithinHysteresis {
        /// Outer lower threshold (entering violation).
        lo_enter: T,
        /// Inner lower threshold (exiting violation).
        lo_exit: T,
        /// Inner upper threshold (exiting violation).
        hi_exit: T,
        /// Outer upper threshold (entering violation).
        hi_enter: T,
    },
    /// `Outside` with separate enter/exit bands.
    ///
    /// Violation starts by entering the inner `[lo_enter, hi_enter]` band and
    /// clears only by moving past the outer `[lo_exit, hi_exit]` band.
    OutsideHysteresis {
        /// Outer lower threshold (exiting violation).
        lo_exit: T,
        /// Inner lower threshold (entering violation).
        lo_enter: T,
        /// Inner upper threshold (entering violation).
        hi_enter: T,
        /// Outer upper threshold (exiting violation).
        hi_exit: T,
    },
}

impl<T> Limits<T> {
    /// Name of the rule kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Above { .. } => "Above",
            Self::Below { .. } => "Below",
            Self::Within { .. } => "Within",
            Self::Outside { .. } => "Outside",
            Self::WithinHysteresis { .. } => "WithinHysteresis",
            Self::OutsideHysteresis { .. } => "OutsideHysteresis",
        }
    }
}

/// A bound limit check: thresholds + boundary policy + debounce state.
///
/// Each rule instance owns its own debounce state; cloning a rule clones the
/// state, so per-signal instances must be created per signal (see
/// [`RuleSet`](crate::envelope::RuleSet) for arrays).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule<T, R: TimeRep> {
    limits: Limits<T>,
    boundary: Boundary,
    debounce: Debounce<R>,
}

impl<T: PartialOrd + Copy, R: TimeRep> Rule<T, R> {
    /// Rule violated when the value exceeds `hi`.
    #[must_use]
    pub fn above(hi: T) -> Self {
        Self::from_limits(Limits::Above { hi })
    }

    /// Rule violated when the value falls below `lo`.
    #[must_use]
    pub fn below(lo: T) -> Self {
        Self::from_limits(Limits::Below { lo })
    }

    /// Rule violated when the value leaves `[lo, hi]`.
    #[must_use]
    pub fn within(lo: T, hi: T) -> Self {
        Self::from_limits(Limits::Within { lo, hi })
    }

    /// Rule violated when the value enters the forbidden band `[lo, hi]`.
    #[must_use]
    pub fn outside(lo: T, hi: T) -> Self {
        Self::from_limits(Limits::Outside { lo, hi })
    }

    /// `Within` rule with hysteresis bands.
    ///
    /// The caller must supply `lo_enter <= lo_exit <= hi_exit <= hi_enter`
    /// (inner band inside the outer band); the ordering is asserted in debug
    /// builds only.
    #[must_use]
    pub fn within_hysteresis(lo_enter: T, lo_exit: T, hi_exit: T, hi_enter: T) -> Self {
        debug_assert!(
            lo_enter <= lo_exit && lo_exit <= hi_exit && hi_exit <= hi_enter,
            "within-hysteresis thresholds must satisfy lo_enter <= lo_exit <= hi_exit <= hi_enter"
        );
        Self::from_limits(Limits::WithinHysteresis {
            lo_enter,
            lo_exit,
            hi_exit,
            hi_enter,
        })
    }

    /// `Outside` rule with hysteresis bands.
    ///
    /// The caller must supply `lo_exit <= lo_enter <= hi_enter <= hi_exit`
    /// (inner band inside the outer band); the ordering is asserted in debug
    /// builds only.
    #[must_use]
    pub fn outside_hysteresis(lo_exit: T, lo_enter: T, hi_enter: T, hi_exit: T) -> Self {
        debug_assert!(
            lo_exit <= lo_enter && lo_enter <= hi_enter && hi_enter <= hi_exit,
            "outside-hysteresis thresholds must satisfy lo_exit <= lo_enter <= hi_enter <= hi_exit"
        );
        Self::from_limits(Limits::OutsideHysteresis {
            lo_exit,
            lo_enter,
            hi_enter,
            hi_exit,
        })
    }

    /// Builds a rule directly from a [`Limits`] value (immediate transitions,
    /// inclusive boundaries).
    #[must_use]
    pub fn from_limits(limits: Limits<T>) -> Self {
        Self {
            limits,
            boundary: Boundary::default(),
            debounce: Debounce::immediate(),
        }
    }

    /// Sets the enter/exit debounce delays.
    #[must_use]
    pub fn with_delays(mut self, enter_delay: R, exit_delay: R) -> Self {
        self.debounce.enter_delay = enter_delay;
        self.debounce.exit_delay = exit_delay;
        self
    }

    /// Sets the threshold-edge comparison policy.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Evaluates the rule against one sample and returns the debounced
    /// violation output.
    pub fn evaluate(&mut self, v: T, now: R) -> bool {
        let b = self.boundary;
        let cond = match self.limits {
            Limits::Above { hi } => !b.below_ok(&v, &hi),
            Limits::Below { lo } => !b.above_ok(&v, &lo),
            Limits::Within { lo, hi } => !b.inside_ok(&v, &lo, &hi),
            Limits::Outside { lo, hi } => b.inside_ok(&v, &lo, &hi),
            Limits::WithinHysteresis {
                lo_enter,
                lo_exit,
                hi_exit,
                hi_enter,
            } => {
                if self.debounce.is_violating() {
                    // Stay violating until back inside the inner band.
                    !b.inside_ok(&v, &lo_exit, &hi_exit)
                } else {
                    // Start violating only past the outer band.
                    !b.inside_ok(&v, &lo_enter, &hi_enter)
                }
            }
            Limits::OutsideHysteresis {
                lo_exit,
                lo_enter,
                hi_enter,
                hi_exit,
            } => {
                if self.debounce.is_violating() {
                    // Stay violating while still inside the outer band.
                    b.inside_ok(&v, &lo_exit, &hi_exit)
                } else {
                    // Start violating only inside the inner band.
                    b.inside_ok(&v, &lo_enter, &hi_enter)
                }
            }
        };
        self.debounce.step(cond, now)
    }

    /// Clears pending timers and the violating state.
    pub fn reset(&mut self) {
        self.debounce.reset();
    }

    /// True while the rule's stabilized output is "violation".
    #[must_use]
    pub const fn is_violating(&self) -> bool {
        self.debounce.is_violating()
    }

    /// The rule's threshold configuration.
    #[must_use]
    pub const fn limits(&self) -> &Limits<T> {
        &self.limits
    }

    /// The rule's boundary policy.
    #[must_use]
    pub const fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// A plain serializable view of the rule for diagnostics.
    #[must_use]
    pub const fn view(&self) -> RuleView<T, R> {
        RuleView {
            limits: self.limits,
            boundary: self.boundary,
            enter_delay: self.debounce.enter_delay,
            exit_delay: self.debounce.exit_delay,
            violating: self.debounce.is_violating(),
        }
    }
}

/// Flat inspection view of a bound rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleView<T, R> {
    /// Threshold configuration.
    pub limits: Limits<T>,
    /// Boundary policy.
    pub boundary: Boundary,
    /// Enter debounce delay.
    pub enter_delay: R,
    /// Exit debounce delay.
    pub exit_delay: R,
    /// Current stabilized output.
    pub violating: bool,
}

impl<T: fmt::Display, R: fmt::Display> fmt::Display for RuleView<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.limits {
            Limits::Above { hi } => write!(f, "Above {hi}")?,
            Limits::Below { lo } => write!(f, "Below {lo}")?,
            Limits::Within { lo, hi } => write!(f, "Within [{lo}, {hi}]")?,
            Limits::Outside { lo, hi } => write!(f, "Outside [{lo}, {hi}]")?,
            Limits::WithinHysteresis {
                lo_enter,
                lo_exit,
                hi_exit,
                hi_enter,
            } => write!(
                f,
                "WithinHysteresis enter [{lo_enter}, {hi_enter}], exit [{lo_exit}, {hi_exit}]"
            )?,
            Limits::OutsideHysteresis {
                lo_exit,
                lo_enter,
                hi_enter,
                hi_exit,
            } => write!(
                f,
                "OutsideHysteresis enter [{lo_enter}, {hi_enter}], exit [{lo_exit}, {hi_exit}]"
            )?,
        }
        write!(f, " (enter {}, exit {})", self.enter_delay, self.exit_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_violates_past_threshold() {
        let mut r = Rule::<f64, f64>::above(10.0);
        assert!(!r.evaluate(9.0, 0.0));
        // Inclusive default: the threshold value itself is acceptable.
        assert!(!r.evaluate(10.0, 1.0));
        assert!(r.evaluate(10.1, 2.0));
    }

    #[test]
    fn exclusive_boundary_rejects_edge_value() {
        let mut r = Rule::<f64, f64>::above(10.0).with_boundary(Boundary::Exclusive);
        assert!(r.evaluate(10.0, 0.0));
        r.reset();
        assert!(!r.evaluate(9.999, 0.0));
    }

    #[test]
    fn below_violates_under_threshold() {
        let mut r = Rule::<f32, f32>::below(0.0);
        assert!(!r.evaluate(0.0, 0.0));
        assert!(r.evaluate(-0.5, 1.0));
    }

    #[test]
    fn within_and_outside_are_complementary() {
        let mut inside = Rule::<i32, u32>::within(10, 20);
        let mut forbidden = Rule::<i32, u32>::outside(10, 20);

        assert!(!inside.evaluate(15, 0));
        assert!(forbidden.evaluate(15, 0));

        assert!(inside.evaluate(25, 1));
        assert!(!forbidden.evaluate(25, 1));
    }

    #[test]
    fn rule_with_enter_delay_debounces() {
        let mut r = Rule::<f64, f64>::below(0.0).with_delays(2.0, 0.0);
        assert!(!r.evaluate(-1.0, 0.0));
        assert!(!r.evaluate(-1.0, 1.0));
        assert!(r.evaluate(-1.0, 3.0));
    }

    #[test]
    fn within_hysteresis_latches_until_inner_band() {
        // Outer band [0, 100], inner band [20, 80].
        let mut r = Rule::<f64, f64>::within_hysteresis(0.0, 20.0, 80.0, 100.0);

        // Between outer and inner: still normal (never left the outer band).
        assert!(!r.evaluate(90.0, 0.0));
        // Past the outer band: violation.
        assert!(r.evaluate(101.0, 1.0));
        // Back between the bands: still violating (not yet inside inner).
        assert!(r.evaluate(90.0, 2.0));
        // Inside the inner band: clears.
        assert!(!r.evaluate(50.0, 3.0));
        // Between bands again after clearing: still normal.
        assert!(!r.evaluate(90.0, 4.0));
    }

    #[test]
    fn outside_hysteresis_latches_until_outer_band() {
        // Forbidden inner band [40, 60], release outer band [20, 80].
        let mut r = Rule::<f64, f64>::outside_hysteresis(20.0, 40.0, 60.0, 80.0);

        // Between the bands: normal (never entered the inner band).
        assert!(!r.evaluate(30.0, 0.0));
        // Inside the inner band: violation.
        assert!(r.evaluate(50.0, 1.0));
        // Between the bands: still violating (not yet past outer).
        assert!(r.evaluate(70.0, 2.0));
        // Past the outer band: clears.
        assert!(!r.evaluate(90.0, 3.0));
    }

    #[test]
    fn reset_restores_normal() {
        let mut r = Rule::<f64, f64>::above(0.0);
        assert!(r.evaluate(1.0, 0.0));
        r.reset();
        assert!(!r.is_violating());
    }

    #[test]
    fn view_round_trips_configuration() {
        let r = Rule::<f64, f64>::within(1.0, 2.0).with_delays(0.5, 0.25);
        let view = r.view();
        assert_eq!(view.limits, Limits::Within { lo: 1.0, hi: 2.0 });
        assert_eq!(view.enter_delay, 0.5);
        assert!(!view.violating);
        assert_eq!(r.limits().kind_name(), "Within");

        let text = view.to_string();
        assert!(text.contains("Within"));
        assert!(text.contains("enter 0.5"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["limits"]["kind"], "within");
    }
}
