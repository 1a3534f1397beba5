//! Envelope/limit-violation engine.
//!
//! An envelope is a fixed-capacity, priority-ordered set of limit rules
//! evaluated against one value: the first rule (lowest index) whose debounced
//! output is "violation" wins. Binding order therefore encodes operator
//! intent — most urgent or most specific rule first.

/// Enter/exit debounce state machine.
pub mod debounce;
/// Rule kinds and boundary policy.
pub mod rule;
/// Per-element rule sets and array reducers.
pub mod array;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::TimeRep;

pub use array::{ArrayEnvelope, ArrayVerdict, Reducer, RuleSet};
pub use debounce::Debounce;
pub use rule::{Boundary, Limits, Rule, RuleView};

/// Stabilized envelope state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// No rule is violating.
    #[default]
    Normal,
    /// At least one rule is violating.
    Violation,
}

/// Outcome of a scalar envelope evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdict {
    /// Aggregate state.
    pub state: State,
    /// Index of the violated rule in binding order; `None` when normal.
    pub index: Option<usize>,
}

impl Verdict {
    /// The all-clear verdict.
    pub const NORMAL: Self = Self {
        state: State::Normal,
        index: None,
    };

    /// Verdict reporting a violation of the rule at `index`.
    #[must_use]
    pub const fn violation(index: usize) -> Self {
        Self {
            state: State::Violation,
            index: Some(index),
        }
    }

    /// True when the verdict reports a violation.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(self.state, State::Violation)
    }
}

/// Returned when binding a rule to a full envelope.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("envelope rule capacity ({0}) exceeded")]
pub struct CapacityExceeded(pub usize);

/// Fixed-capacity, priority-ordered rule aggregator.
///
/// `N` is the compile-time rule capacity. Rules are owned by the envelope
/// and evaluated in binding order; evaluation is strict first-match, not
/// voting or severity ranking.
#[derive(Debug, Clone)]
pub struct Envelope<T, R: TimeRep, const N: usize> {
    rules: [Option<Rule<T, R>>; N],
    len: usize,
}

impl<T: PartialOrd + Copy, R: TimeRep, const N: usize> Envelope<T, R, N> {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: std::array::from_fn(|_| None),
            len: 0,
        }
    }

    /// Appends a rule; earlier bindings have higher priority.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded`] when all `N` slots are taken; the
    /// envelope is unchanged.
    pub fn bind(&mut self, rule: Rule<T, R>) -> Result<usize, CapacityExceeded> {
        if self.len >= N {
            return Err(CapacityExceeded(N));
        }
        let index = self.len;
        self.rules[index] = Some(rule);
        self.len += 1;
        Ok(index)
    }

    /// Evaluates all bound rules against one sample, in priority order.
    ///
    /// Every rule is stepped (so debounce timers advance even for
    /// lower-priority rules), but the verdict reports the lowest violating
    /// index.
    pub fn update(&mut self, value: T, now: R) -> Verdict {
        let mut verdict = Verdict::NORMAL;
        for (i, rule) in self.rules.iter_mut().take(self.len).flatten().enumerate() {
            if rule.evaluate(value, now) && verdict.index.is_none() {
                verdict = Verdict::violation(i);
            }
        }
        verdict
    }

    /// Resets every bound rule to its normal state.
    pub fn reset_all(&mut self) {
        for rule in self.rules.iter_mut().take(self.len).flatten() {
            rule.reset();
        }
    }

    /// Number of bound rules.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no rules are bound.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The envelope's fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The rule bound at `index`, if any.
    #[must_use]
    pub fn rule(&self, index: usize) -> Option<&Rule<T, R>> {
        self.rules.get(index).and_then(Option::as_ref)
    }
}

impl<T: PartialOrd + Copy, R: TimeRep, const N: usize> Default for Envelope<T, R, N> {
    fn default() -> Self {
        Self::new()
    }
}
