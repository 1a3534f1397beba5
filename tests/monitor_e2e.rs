use std::time::Duration;

use watchbus::{
    mailbox, ArrayEnvelope, MsgBus, ParamMonitor, Reducer, Rule, RuleSet, State, Stats, Verdict,
};

#[test]
fn below_rule_with_enter_delay_end_to_end() {
    let bus = MsgBus::new();
    let mut temp = ParamMonitor::<f64, f64>::new(&bus, "temp", 60.0).unwrap();
    temp.add_envelope_rule(Rule::below(0.0).with_delays(2.0, 0.0))
        .unwrap();

    let (inbox, rx) = mailbox(8, Duration::ZERO);
    bus.subscribe(temp.violation_topic_id(), inbox, 0xA0).unwrap();

    assert_eq!(temp.update(-1.0, 0.0).state, State::Normal);
    assert_eq!(temp.update(-1.0, 1.0).state, State::Normal);
    let verdict = temp.update(-1.0, 3.0);
    assert_eq!(verdict, Verdict::violation(0));

    // Exactly one violation event: the transition, not every violating
    // sample.
    let msg = rx.try_recv().unwrap();
    assert_eq!(msg.id(), 0xA0);
    assert_eq!(*msg.payload::<Verdict>().unwrap(), Verdict::violation(0));
    assert!(rx.try_recv().is_none());
}

#[test]
fn violation_events_are_edge_triggered_both_ways() {
    let bus = MsgBus::new();
    let mut level = ParamMonitor::<f64, f64>::new(&bus, "level", 60.0).unwrap();
    level.add_envelope_rule(Rule::above(100.0)).unwrap();

    let (inbox, rx) = mailbox(8, Duration::ZERO);
    bus.subscribe(level.violation_topic_id(), inbox, 1).unwrap();

    level.update(50.0, 0.0);
    level.update(150.0, 1.0); // enter
    level.update(160.0, 2.0); // still violating, no event
    level.update(50.0, 3.0); // exit
    level.update(40.0, 4.0); // still normal, no event

    let enter = rx.try_recv().unwrap();
    assert_eq!(enter.payload::<Verdict>().unwrap().state, State::Violation);
    let exit = rx.try_recv().unwrap();
    assert_eq!(exit.payload::<Verdict>().unwrap().state, State::Normal);
    assert!(rx.try_recv().is_none());
}

#[test]
fn every_sample_is_republished_on_the_value_topic() {
    let bus = MsgBus::new();
    let mut rpm = ParamMonitor::<u32, u64>::new(&bus, "rpm", 1_000_000).unwrap();

    let (inbox, rx) = mailbox(8, Duration::ZERO);
    bus.subscribe(rpm.value_topic_id(), inbox, 7).unwrap();

    rpm.update(800, 0);
    rpm.update(900, 1_000);
    rpm.update(900, 2_000);

    let received: Vec<u32> = std::iter::from_fn(|| rx.try_recv())
        .map(|m| *m.payload::<u32>().unwrap())
        .collect();
    assert_eq!(received, vec![800, 900, 900]);
}

#[test]
fn constant_input_yields_one_stats_message_per_window() {
    let bus = MsgBus::new();
    let mut volts = ParamMonitor::<f64, f64>::new(&bus, "volts", 60.0).unwrap();

    let (inbox, rx) = mailbox(8, Duration::ZERO);
    bus.subscribe(volts.stats_topic_id(), inbox, 2).unwrap();

    // Constant samples every 10 s for a bit over two windows.
    let mut t = 0.0;
    while t <= 130.0 {
        volts.update(3.3, t);
        t += 10.0;
    }

    let snapshots: Vec<Stats<f64>> = std::iter::from_fn(|| rx.try_recv())
        .map(|m| *m.payload::<Stats<f64>>().unwrap())
        .collect();
    assert_eq!(snapshots.len(), 2);
    for stats in snapshots {
        assert_eq!(stats.min, 3.3);
        assert_eq!(stats.max, 3.3);
        assert!((stats.avg - 3.3).abs() < 1e-12);
        assert!(stats.count > 0);
    }
}

#[test]
fn stats_capture_min_avg_max_of_the_window() {
    let bus = MsgBus::new();
    let mut current = ParamMonitor::<f64, f64>::new(&bus, "current", 30.0).unwrap();

    let (inbox, rx) = mailbox(4, Duration::ZERO);
    bus.subscribe(current.stats_topic_id(), inbox, 3).unwrap();

    current.update(1.0, 0.0);
    current.update(5.0, 10.0);
    current.update(3.0, 30.0);

    let stats = *rx.try_recv().unwrap().payload::<Stats<f64>>().unwrap();
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 5.0);
    assert!((stats.avg - 3.0).abs() < 1e-12);
    assert_eq!(stats.count, 3);
}

#[test]
fn priority_reports_the_lowest_bound_index() {
    let bus = MsgBus::new();
    let mut pressure = ParamMonitor::<f64, f64>::new(&bus, "pressure", 60.0).unwrap();

    // Rule 0: forbidden band around 50; rule 1: anything above 10. Both
    // violate at 50, rule 0 must win.
    pressure
        .add_envelope_rule(Rule::outside(40.0, 60.0))
        .unwrap();
    pressure.add_envelope_rule(Rule::above(10.0)).unwrap();

    assert_eq!(pressure.update(50.0, 0.0), Verdict::violation(0));
    // Outside the band but above 10: rule 1 takes over.
    assert_eq!(pressure.update(20.0, 1.0), Verdict::violation(1));
}

#[test]
fn array_envelope_over_cell_voltages() {
    // Pack-level rule: trip when at least 2 of 4 cells sit below 3.0 V for
    // 5 seconds.
    let mut pack = ArrayEnvelope::<f64, f64, 4>::new(Reducer::CountAtLeast { k: 2 });
    pack.bind(RuleSet::uniform(&Rule::below(3.0).with_delays(5.0, 0.0)));

    assert!(!pack.update(&[3.2, 2.8, 3.1, 2.7], 0.0).is_violation());
    assert!(!pack.update(&[3.2, 2.8, 3.1, 2.7], 4.0).is_violation());

    let verdict = pack.update(&[3.2, 2.8, 3.1, 2.7], 5.0);
    assert!(verdict.is_violation());
    assert_eq!(verdict.first_index, Some(1));
    assert_eq!(verdict.count, 2);

    // One cell recovers: back under the threshold count.
    assert!(!pack.update(&[3.2, 3.4, 3.1, 2.7], 6.0).is_violation());
}
