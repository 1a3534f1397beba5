//! Error types for watchbus.
//!
//! All errors are strongly typed using thiserror. Bus operations never panic
//! and never throw through a side channel: every fallible entry point returns
//! a value from the closed enumerations below, and the caller decides whether
//! to log, retry, or escalate.

use thiserror::Error;

use crate::bus::TopicId;

/// Result codes for message bus operations.
///
/// A rejected operation is inert: no registry or subscriber state changes,
/// the previous condition holds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Registration was attempted with an empty topic name.
    #[error("Topic name is empty")]
    ZeroTopic,

    /// A topic with the same name (id) is already registered.
    #[error("Topic already registered: {name}")]
    TopicExists {
        /// Name of the already-registered topic.
        name: String,
    },

    /// No topic with this id is registered.
    #[error("Topic not found: {id}")]
    TopicNotFound {
        /// The id that failed to resolve.
        id: TopicId,
    },

    /// The topic is registered with a different payload type.
    #[error("Payload type mismatch for topic {id}")]
    TypeMismatch {
        /// Id of the topic whose payload type differs.
        id: TopicId,
    },

    /// The (receiver, id) pair is already subscribed to the topic.
    #[error("Subscription already exists: msg id {msg_id}")]
    SubExists {
        /// The duplicate subscription's message id.
        msg_id: u32,
    },

    /// The (receiver, id) pair is not subscribed to the topic.
    #[error("Subscription not found: msg id {msg_id}")]
    SubNotFound {
        /// The missing subscription's message id.
        msg_id: u32,
    },

    /// The topic has no write handler (or no JSON codec, for JSON entry
    /// points): the requested optional capability is not configured.
    #[error("Topic does not support the requested write")]
    WriteNotSupported,

    /// The topic's write handler rejected the value.
    #[error("Write rejected by topic handler")]
    WriteFailed,

    /// JSON text could not be decoded (or a value could not be encoded) by
    /// the topic's codec.
    #[error("JSON codec failed: {reason}")]
    JsonParseFailed {
        /// Codec-reported failure reason.
        reason: String,
    },
}

impl BusError {
    /// Returns true if the error indicates a configuration problem
    /// (duplicate registration, missing topic, type mismatch) rather than a
    /// runtime rejection.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ZeroTopic
                | Self::TopicExists { .. }
                | Self::TopicNotFound { .. }
                | Self::TypeMismatch { .. }
        )
    }
}

/// Errors from parameter monitor configuration.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The monitor's envelope is full; the rule was not bound.
    #[error("Envelope rule capacity ({capacity}) exceeded")]
    RuleCapacity {
        /// Maximum number of rules the envelope accepts.
        capacity: usize,
    },

    /// Registering one of the monitor's topics failed.
    #[error("Topic registration failed: {0}")]
    Bus(#[from] BusError),
}

/// Result type alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_error_display() {
        let err = BusError::TopicExists {
            name: "temp.value".to_string(),
        };
        assert!(err.to_string().contains("temp.value"));

        let err = BusError::TopicNotFound {
            id: TopicId::of("missing"),
        };
        assert!(err.to_string().contains("Topic not found"));

        let err = BusError::JsonParseFailed {
            reason: "expected number".to_string(),
        };
        assert!(err.to_string().contains("expected number"));
    }

    #[test]
    fn configuration_classification() {
        assert!(BusError::ZeroTopic.is_configuration());
        assert!(BusError::TypeMismatch {
            id: TopicId::of("t")
        }
        .is_configuration());
        assert!(!BusError::WriteFailed.is_configuration());
        assert!(!BusError::SubExists { msg_id: 7 }.is_configuration());
    }

    #[test]
    fn monitor_error_from_bus() {
        let err: MonitorError = BusError::TopicExists {
            name: "t".to_string(),
        }
        .into();
        assert!(err.to_string().contains("registration failed"));

        let err = MonitorError::RuleCapacity { capacity: 4 };
        assert!(err.to_string().contains('4'));
    }
}
