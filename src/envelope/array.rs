//! Array evaluation: per-element rule instances plus reducers.
//!
//! Array signals (cell voltages, multi-zone temperatures) get one rule
//! instance per element so debounce timers never mix across signals, then a
//! reducer turns the per-element outputs into a single array decision.

use serde::{Deserialize, Serialize};

use crate::envelope::rule::Rule;
use crate::envelope::State;
use crate::time::TimeRep;

/// Policy reducing per-element violation outputs to one array decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reducer", rename_all = "snake_case")]
pub enum Reducer {
    /// Violation when at least one element violates.
    AnyElement,
    /// Violation only when every element violates.
    AllElements,
    /// Violation when at least `k` elements violate.
    CountAtLeast {
        /// Minimum number of violating elements.
        k: usize,
    },
    /// Violation when the violating fraction reaches `num / den`
    /// (the required count is `ceil(num * N / den)`).
    FractionAtLeast {
        /// Fraction numerator.
        num: usize,
        /// Fraction denominator; must be nonzero.
        den: usize,
    },
    /// Violation when a contiguous run of at least `len` violating elements
    /// exists; the verdict reports the run's start and full length.
    RunLengthAtLeast {
        /// Minimum run length.
        len: usize,
    },
}

impl Reducer {
    /// Reduces the per-element outputs to `Some((first_index, count))` on
    /// violation, `None` when the array is normal.
    fn reduce(self, hits: &[bool]) -> Option<(usize, usize)> {
        let n = hits.len();
        let violators = hits.iter().filter(|&&h| h).count();
        let first = hits.iter().position(|&h| h);

        match self {
            Self::AnyElement => first.map(|i| (i, violators)),
            Self::AllElements => (violators == n && n > 0).then(|| (0, n)),
            Self::CountAtLeast { k } => {
                (violators >= k.max(1)).then(|| (first.unwrap_or(0), violators))
            }
            Self::FractionAtLeast { num, den } => {
                debug_assert!(den > 0, "fraction denominator must be nonzero");
                if den == 0 {
                    return None;
                }
                let required = (num * n).div_ceil(den).max(1);
                (violators >= required).then(|| (first.unwrap_or(0), violators))
            }
            Self::RunLengthAtLeast { len } => {
                let len = len.max(1);
                let mut run_start = 0;
                let mut run = 0;
                for (i, &hit) in hits.iter().enumerate() {
                    if hit {
                        if run == 0 {
                            run_start = i;
                        }
                        run += 1;
                    } else {
                        if run >= len {
                            return Some((run_start, run));
                        }
                        run = 0;
                    }
                }
                (run >= len).then_some((run_start, run))
            }
        }
    }
}

/// Outcome of an array envelope evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArrayVerdict {
    /// Aggregate state.
    pub state: State,
    /// Index of the rule set that fired, in binding order; `None` when
    /// normal.
    pub rule_set: Option<usize>,
    /// First offending element (run start for run-length reduction).
    pub first_index: Option<usize>,
    /// Number of offending elements, or the reported run's length.
    pub count: usize,
}

impl ArrayVerdict {
    /// The all-clear verdict.
    pub const NORMAL: Self = Self {
        state: State::Normal,
        rule_set: None,
        first_index: None,
        count: 0,
    };

    /// True when the verdict reports a violation.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(self.state, State::Violation)
    }
}

/// `N` independent instances of one rule, one per array element.
///
/// Instances are cloned from a prototype at construction (or built per
/// element), so each element's debounce state is isolated from its siblings.
#[derive(Debug, Clone)]
pub struct RuleSet<T, R: TimeRep, const N: usize> {
    rules: [Rule<T, R>; N],
}

impl<T: PartialOrd + Copy, R: TimeRep, const N: usize> RuleSet<T, R, N> {
    /// Builds a set where every element uses a clone of `proto`.
    #[must_use]
    pub fn uniform(proto: &Rule<T, R>) -> Self {
        Self {
            rules: std::array::from_fn(|_| {
                let mut rule = proto.clone();
                rule.reset();
                rule
            }),
        }
    }

    /// Builds a set with a per-element constructor (e.g. per-cell limits).
    #[must_use]
    pub fn from_fn(mut f: impl FnMut(usize) -> Rule<T, R>) -> Self {
        Self {
            rules: std::array::from_fn(|i| f(i)),
        }
    }

    /// The rule instance for element `i`.
    #[must_use]
    pub fn rule(&self, i: usize) -> Option<&Rule<T, R>> {
        self.rules.get(i)
    }

    /// Resets every element's rule to its normal state.
    pub fn reset_all(&mut self) {
        for rule in &mut self.rules {
            rule.reset();
        }
    }

    /// Steps every element's rule and records the outputs.
    fn evaluate_into(&mut self, values: &[T; N], now: R, hits: &mut [bool; N]) {
        for (i, rule) in self.rules.iter_mut().enumerate() {
            hits[i] = rule.evaluate(values[i], now);
        }
    }
}

/// Priority-ordered aggregation of rule sets over an array signal.
///
/// All rule sets share one reducer. Every element of every set is stepped on
/// each update (debounce timers advance independently of siblings and of
/// higher-priority sets); the verdict reports the lowest-index violating set.
#[derive(Debug, Clone)]
pub struct ArrayEnvelope<T, R: TimeRep, const N: usize> {
    sets: Vec<RuleSet<T, R, N>>,
    reducer: Reducer,
}

impl<T: PartialOrd + Copy, R: TimeRep, const N: usize> ArrayEnvelope<T, R, N> {
    /// Creates an empty array envelope with the given reducer.
    #[must_use]
    pub fn new(reducer: Reducer) -> Self {
        Self {
            sets: Vec::new(),
            reducer,
        }
    }

    /// Appends a rule set; earlier bindings have higher priority.
    pub fn bind(&mut self, set: RuleSet<T, R, N>) -> usize {
        self.sets.push(set);
        self.sets.len() - 1
    }

    /// Evaluates all rule sets against one array sample.
    pub fn update(&mut self, values: &[T; N], now: R) -> ArrayVerdict {
        let mut verdict = ArrayVerdict::NORMAL;
        let mut hits = [false; N];

        for (set_index, set) in self.sets.iter_mut().enumerate() {
            set.evaluate_into(values, now, &mut hits);
            if verdict.rule_set.is_none() {
                if let Some((first, count)) = self.reducer.reduce(&hits) {
                    verdict = ArrayVerdict {
                        state: State::Violation,
                        rule_set: Some(set_index),
                        first_index: Some(first),
                        count,
                    };
                }
            }
        }
        verdict
    }

    /// Resets every rule of every set.
    pub fn reset_all(&mut self) {
        for set in &mut self.sets {
            set.reset_all();
        }
    }

    /// The configured reducer.
    #[must_use]
    pub const fn reducer(&self) -> Reducer {
        self.reducer
    }

    /// Number of bound rule sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True when no rule sets are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// The rule set bound at `index`, if any.
    #[must_use]
    pub fn rule_set(&self, index: usize) -> Option<&RuleSet<T, R, N>> {
        self.sets.get(index)
    }
}
