//! Per-parameter monitoring: value/stats/violation topic triad.
//!
//! A [`ParamMonitor`] is the composition layer over the bus and the
//! envelope engine. Each ingested sample is republished live on the value
//! topic, folded into a windowed min/avg/max accumulator whose snapshot is
//! published when the window closes, and evaluated against the bound
//! envelope rules, with violation verdicts published on state transitions
//! only (edge-triggered, not level-triggered).

use crate::bus::{MsgBus, Topic, TopicId};
use crate::envelope::{CapacityExceeded, Envelope, Rule, Verdict};
use crate::error::MonitorError;
use crate::stats::{Sample, Stats, WindowedStats};
use crate::time::TimeRep;

/// Envelope rule capacity of a parameter monitor.
pub const MAX_RULES: usize = 4;

/// Default statistics window, in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 60.0;

/// Monitors one parameter over time: live value, windowed statistics, and
/// envelope violation detection, each published on its own topic.
///
/// Construction registers three topics on the bus:
///
/// - `<name>.value` — every sample, republished live (payload `T`)
/// - `<name>.stats` — one [`Stats`] snapshot per closed window
/// - `<name>.violation` — [`Verdict`] transitions
pub struct ParamMonitor<T: Sample, R: TimeRep> {
    name: String,
    value_topic: Topic<T>,
    stats_topic: Topic<Stats<T>>,
    violation_topic: Topic<Verdict>,
    window: WindowedStats<T, R>,
    envelope: Envelope<T, R, MAX_RULES>,
    last: Verdict,
}

impl<T: Sample, R: TimeRep> ParamMonitor<T, R> {
    /// Creates a monitor and registers its topic triad on `bus`.
    ///
    /// Topics are registered in value, stats, violation order; on a
    /// duplicate-name failure the earlier registrations stay in place (the
    /// registry is insertion-only and has no rollback).
    ///
    /// # Errors
    ///
    /// [`MonitorError::Bus`] when any of the three names is already
    /// registered.
    pub fn new(bus: &MsgBus, name: &str, window: R) -> Result<Self, MonitorError> {
        let value_topic = Topic::new(format!("{name}.value"), T::default());
        let stats_topic = Topic::new(format!("{name}.stats"), Stats::default());
        let violation_topic = Topic::new(format!("{name}.violation"), Verdict::NORMAL);

        bus.register(&value_topic)?;
        bus.register(&stats_topic)?;
        bus.register(&violation_topic)?;

        Ok(Self {
            name: name.to_string(),
            value_topic,
            stats_topic,
            violation_topic,
            window: WindowedStats::new(window),
            envelope: Envelope::new(),
            last: Verdict::NORMAL,
        })
    }

    /// Ingests one sample at time `now` and returns the current verdict.
    ///
    /// Publishes the sample on the value topic unconditionally, the window
    /// snapshot on the stats topic when the window has elapsed, and the
    /// verdict on the violation topic when its state differs from the last
    /// observed state.
    pub fn update(&mut self, value: T, now: R) -> Verdict {
        self.value_topic.publish(value);

        if self.window.add(value, now) {
            if let Some(stats) = self.window.snapshot() {
                self.stats_topic.publish(stats);
            }
            self.window.reset();
        }

        let verdict = self.envelope.update(value, now);
        if verdict.state != self.last.state {
            self.violation_topic.publish(verdict);
            self.last = verdict;
        }
        verdict
    }

    /// Binds an envelope rule; rules bound earlier have higher priority.
    ///
    /// # Errors
    ///
    /// [`MonitorError::RuleCapacity`] once [`MAX_RULES`] rules are bound;
    /// the envelope is unchanged.
    pub fn add_envelope_rule(&mut self, rule: Rule<T, R>) -> Result<usize, MonitorError> {
        self.envelope
            .bind(rule)
            .map_err(|CapacityExceeded(capacity)| MonitorError::RuleCapacity { capacity })
    }

    /// The rule behind a violation verdict, if it reports one.
    #[must_use]
    pub fn violation_rule(&self, verdict: &Verdict) -> Option<&Rule<T, R>> {
        verdict.index.and_then(|i| self.envelope.rule(i))
    }

    /// The monitored parameter's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the `<name>.value` topic.
    #[must_use]
    pub fn value_topic_id(&self) -> TopicId {
        self.value_topic.id()
    }

    /// Id of the `<name>.stats` topic.
    #[must_use]
    pub fn stats_topic_id(&self) -> TopicId {
        self.stats_topic.id()
    }

    /// Id of the `<name>.violation` topic.
    #[must_use]
    pub fn violation_topic_id(&self) -> TopicId {
        self.violation_topic.id()
    }

    /// The windowed statistics accumulator.
    #[must_use]
    pub const fn stats(&self) -> &WindowedStats<T, R> {
        &self.window
    }

    /// The bound envelope.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope<T, R, MAX_RULES> {
        &self.envelope
    }

    /// Discards the current statistics window.
    pub fn reset_stats(&mut self) {
        self.window.reset();
    }

    /// Restarts the monitoring session: clears every rule's debounce state,
    /// the last observed verdict, and the statistics window.
    pub fn reset(&mut self) {
        self.envelope.reset_all();
        self.window.reset();
        self.last = Verdict::NORMAL;
    }
}

impl<T: Sample> ParamMonitor<T, f64> {
    /// Creates a monitor with the default 60 s statistics window.
    ///
    /// # Errors
    ///
    /// [`MonitorError::Bus`] when any of the three topic names is already
    /// registered.
    pub fn with_default_window(bus: &MsgBus, name: &str) -> Result<Self, MonitorError> {
        Self::new(bus, name, DEFAULT_WINDOW_SECS)
    }
}

impl<T: Sample + std::fmt::Debug, R: TimeRep> std::fmt::Debug for ParamMonitor<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamMonitor")
            .field("name", &self.name)
            .field("rules", &self.envelope.len())
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::State;

    #[test]
    fn update_returns_envelope_verdict() {
        let bus = MsgBus::new();
        let mut monitor = ParamMonitor::<f64, f64>::new(&bus, "temp", 60.0).unwrap();
        monitor
            .add_envelope_rule(Rule::below(0.0).with_delays(2.0, 0.0))
            .unwrap();

        assert_eq!(monitor.update(-1.0, 0.0), Verdict::NORMAL);
        assert_eq!(monitor.update(-1.0, 1.0), Verdict::NORMAL);
        assert_eq!(monitor.update(-1.0, 3.0), Verdict::violation(0));
    }

    #[test]
    fn rule_capacity_is_rejected_loudly() {
        let bus = MsgBus::new();
        let mut monitor = ParamMonitor::<f64, f64>::new(&bus, "p", 60.0).unwrap();
        for _ in 0..MAX_RULES {
            monitor.add_envelope_rule(Rule::above(1.0)).unwrap();
        }
        assert!(matches!(
            monitor.add_envelope_rule(Rule::above(2.0)),
            Err(MonitorError::RuleCapacity {
                capacity: MAX_RULES
            })
        ));
        assert_eq!(monitor.envelope().len(), MAX_RULES);
    }

    #[test]
    fn duplicate_monitor_name_fails_registration() {
        let bus = MsgBus::new();
        let _first = ParamMonitor::<f64, f64>::new(&bus, "dup", 60.0).unwrap();
        let second = ParamMonitor::<f64, f64>::new(&bus, "dup", 60.0);
        assert!(matches!(second, Err(MonitorError::Bus(_))));
    }

    #[test]
    fn violation_rule_resolves_the_firing_rule() {
        let bus = MsgBus::new();
        let mut monitor = ParamMonitor::<f64, f64>::new(&bus, "v", 60.0).unwrap();
        monitor.add_envelope_rule(Rule::above(10.0)).unwrap();

        let verdict = monitor.update(11.0, 0.0);
        let rule = monitor.violation_rule(&verdict).unwrap();
        assert_eq!(rule.limits().kind_name(), "Above");
        assert!(monitor.violation_rule(&Verdict::NORMAL).is_none());
    }

    #[test]
    fn reset_restarts_the_session() {
        let bus = MsgBus::new();
        let mut monitor = ParamMonitor::<f64, f64>::new(&bus, "r", 10.0).unwrap();
        monitor.add_envelope_rule(Rule::above(0.0)).unwrap();

        assert_eq!(monitor.update(1.0, 0.0).state, State::Violation);
        monitor.reset();
        assert!(!monitor.envelope().rule(0).unwrap().is_violating());
        assert_eq!(monitor.stats().snapshot(), None);
        // The next violation is an edge again.
        assert_eq!(monitor.update(1.0, 1.0).state, State::Violation);
    }
}
