//! # watchbus - typed pub/sub with envelope limit monitoring
//!
//! watchbus connects sampling tasks to consumer tasks in preemptive
//! multi-threaded pipelines: a typed, named publish/subscribe bus with
//! bounded fan-out delivery, an envelope engine that turns raw samples into
//! debounced limit-violation verdicts, and a per-parameter monitor composing
//! the two.
//!
//! ## Core Concepts
//!
//! - **Topic**: a named, typed, single-writer publication point with a
//!   subscriber list
//! - **Envelope**: an ordered set of limit rules evaluated in priority order
//!   against one value
//! - **Debounce**: a stabilization filter requiring a condition to persist
//!   before the reported state toggles
//! - **ParamMonitor**: the value/stats/violation pipeline for one monitored
//!   parameter
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use watchbus::{mailbox, MsgBus, ParamMonitor, Rule, Verdict};
//!
//! let bus = MsgBus::new();
//!
//! // One monitored parameter with a low-temperature rule: violation after
//! // the reading stays below 0.0 for 2 seconds.
//! let mut temp = ParamMonitor::<f64, f64>::new(&bus, "temp", 60.0)?;
//! temp.add_envelope_rule(Rule::below(0.0).with_delays(2.0, 0.0))?;
//!
//! // A consumer task subscribes to the violation topic.
//! let (inbox, rx) = mailbox(16, Duration::from_millis(5));
//! bus.subscribe(temp.violation_topic_id(), inbox, 0x10)?;
//!
//! // The sampling task feeds readings.
//! temp.update(-4.0, 0.0);
//! temp.update(-4.0, 2.5);
//!
//! let msg = rx.try_recv().expect("violation published");
//! assert!(msg.payload::<Verdict>().unwrap().is_violation());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod envelope;
pub mod error;
pub mod monitor;
pub mod stats;
pub mod time;

// Re-export primary types at crate root for convenience
pub use bus::{mailbox, BusMsg, Inbox, JsonCodec, Mailbox, MailboxReceiver, MsgBus, Topic, TopicId};
pub use envelope::{
    ArrayEnvelope, ArrayVerdict, Boundary, Debounce, Envelope, Limits, Reducer, Rule, RuleSet,
    RuleView, State, Verdict,
};
pub use error::{BusError, BusResult, MonitorError};
pub use monitor::{ParamMonitor, DEFAULT_WINDOW_SECS, MAX_RULES};
pub use stats::{MinMaxAvg, OnlineStats, Sample, Stats, WindowedStats};
pub use time::{MonotonicClock, TimeRep};
