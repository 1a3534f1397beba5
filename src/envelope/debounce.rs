//! Enter/exit debounce state machine.
//!
//! Converts an instantaneous boolean condition into a stabilized output: the
//! condition must persist for `enter_delay` before the output becomes
//! violating, and must stay clear for `exit_delay` before the output returns
//! to normal. Zero delay makes the corresponding transition immediate.

use crate::time::TimeRep;

/// Internal debounce phase.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase<R> {
    /// Not violating, no pending transition.
    Normal,
    /// Condition true, timer running toward violation.
    EnterPending {
        /// First time the condition was observed true.
        since: R,
    },
    /// Committed to violation.
    Violating,
    /// Condition false while violating, timer running toward normal.
    ExitPending {
        /// First time the condition was observed false.
        since: R,
    },
}

/// Per-rule debounce timers and state.
///
/// The timers are data, not scheduling primitives: they only advance when the
/// owner keeps calling [`Debounce::step`] with fresh timestamps. If the
/// sampling task stalls, so does debounce timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debounce<R: TimeRep> {
    /// Time the condition must persist before entering violation.
    pub enter_delay: R,
    /// Time the condition must stay clear before exiting violation.
    pub exit_delay: R,
    phase: Phase<R>,
}

impl<R: TimeRep> Debounce<R> {
    /// Creates a debouncer with the given enter/exit delays.
    #[must_use]
    pub fn new(enter_delay: R, exit_delay: R) -> Self {
        Self {
            enter_delay,
            exit_delay,
            phase: Phase::Normal,
        }
    }

    /// Creates a debouncer with immediate transitions in both directions.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(R::ZERO, R::ZERO)
    }

    /// Unconditionally clears pending timers and the violating state.
    pub fn reset(&mut self) {
        self.phase = Phase::Normal;
    }

    /// True while the stabilized output is "violation".
    ///
    /// Holds through `ExitPending`: the output only clears once the exit
    /// timer commits.
    #[must_use]
    pub const fn is_violating(&self) -> bool {
        matches!(self.phase, Phase::Violating | Phase::ExitPending { .. })
    }

    /// Advances the state machine with the instantaneous condition at `now`
    /// and returns the stabilized output.
    pub fn step(&mut self, cond_now: bool, now: R) -> bool {
        if cond_now {
            // Moving toward violation; any exit timer is cancelled.
            let since = match self.phase {
                Phase::Violating | Phase::ExitPending { .. } => {
                    self.phase = Phase::Violating;
                    return true;
                }
                Phase::EnterPending { since } => since,
                Phase::Normal => now,
            };
            if R::elapsed(now, since) >= self.enter_delay {
                self.phase = Phase::Violating;
                true
            } else {
                self.phase = Phase::EnterPending { since };
                false
            }
        } else {
            // Moving toward normal; any enter timer is cancelled.
            let since = match self.phase {
                Phase::Normal | Phase::EnterPending { .. } => {
                    self.phase = Phase::Normal;
                    return false;
                }
                Phase::ExitPending { since } => since,
                Phase::Violating => now,
            };
            if R::elapsed(now, since) >= self.exit_delay {
                self.phase = Phase::Normal;
                false
            } else {
                self.phase = Phase::ExitPending { since };
                true
            }
        }
    }
}

impl<R: TimeRep> Default for Debounce<R> {
    fn default() -> Self {
        Self::immediate()
    }
}
