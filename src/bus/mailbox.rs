//! Subscriber delivery endpoints.
//!
//! Fan-out pushes type-erased [`BusMsg`] envelopes into each subscriber's
//! inbox. The bus only requires the [`Inbox`] contract: accept-or-reject
//! within a bounded wait, callable from the publishing task's context.
//! [`Mailbox`] is the stock implementation, a bounded crossbeam channel with
//! a per-mailbox send timeout.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

/// A message pushed to one subscriber: the subscriber's own numeric id plus
/// a shared copy of the published value.
#[derive(Clone)]
pub struct BusMsg {
    id: u32,
    payload: Arc<dyn Any + Send + Sync>,
}

impl BusMsg {
    pub(crate) fn new(id: u32, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self { id, payload }
    }

    /// The numeric id the subscriber chose at subscription time, used to
    /// demultiplex topics sharing one inbox.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Borrows the payload as `T`; `None` when the message carries a
    /// different payload type.
    #[must_use]
    pub fn payload<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Extracts the shared payload as `Arc<T>`; fails back to `self` when
    /// the message carries a different payload type.
    ///
    /// # Errors
    ///
    /// Returns the original message on a payload type mismatch.
    pub fn into_payload<T: Send + Sync + 'static>(self) -> Result<Arc<T>, Self> {
        let id = self.id;
        Arc::downcast(self.payload).map_err(|payload| Self { id, payload })
    }
}

impl fmt::Debug for BusMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusMsg")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Bounded delivery endpoint for subscriber fan-out.
///
/// `deliver` must be safe to call from the publishing task and must honor a
/// bounded wait rather than blocking forever: a full inbox stalls the
/// publisher for at most the endpoint's configured timeout.
pub trait Inbox: Send + Sync {
    /// Attempts to deliver a message; false when the inbox did not accept it
    /// within its bounded wait.
    fn deliver(&self, msg: BusMsg) -> bool;
}

/// Sending half of a bounded subscriber mailbox.
pub struct Mailbox {
    tx: Sender<BusMsg>,
    timeout: Duration,
}

impl Inbox for Mailbox {
    fn deliver(&self, msg: BusMsg) -> bool {
        match self.tx.send_timeout(msg, self.timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_) | SendTimeoutError::Disconnected(_)) => false,
        }
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Receiving half of a bounded subscriber mailbox.
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: Receiver<BusMsg>,
}

impl MailboxReceiver {
    /// Blocks for the next message; `None` once the mailbox is closed.
    #[must_use]
    pub fn recv(&self) -> Option<BusMsg> {
        self.rx.recv().ok()
    }

    /// Waits up to `timeout` for the next message; `None` on timeout or
    /// once the mailbox is closed.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BusMsg> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes the next message if one is queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<BusMsg> {
        self.rx.try_recv().ok()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when no messages are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Creates a bounded mailbox pair.
///
/// `capacity` is the queue depth; `send_timeout` bounds how long a
/// publisher's `notify` may wait on this subscriber when the queue is full
/// (zero means reject immediately).
#[must_use]
pub fn mailbox(capacity: usize, send_timeout: Duration) -> (Arc<Mailbox>, MailboxReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        Arc::new(Mailbox {
            tx,
            timeout: send_timeout,
        }),
        MailboxReceiver { rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: u32, value: f64) -> BusMsg {
        BusMsg::new(id, Arc::new(value))
    }

    #[test]
    fn mailbox_delivers_in_order() {
        let (inbox, rx) = mailbox(4, Duration::ZERO);
        assert!(inbox.deliver(msg(1, 1.0)));
        assert!(inbox.deliver(msg(2, 2.0)));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.id(), 1);
        assert_eq!(first.payload::<f64>(), Some(&1.0));
        assert_eq!(rx.try_recv().unwrap().id(), 2);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn full_mailbox_rejects_within_bounded_wait() {
        let (inbox, _rx) = mailbox(1, Duration::from_millis(10));
        assert!(inbox.deliver(msg(1, 1.0)));
        // Queue full and nobody draining: the bounded wait expires.
        assert!(!inbox.deliver(msg(2, 2.0)));
    }

    #[test]
    fn closed_mailbox_rejects() {
        let (inbox, rx) = mailbox(1, Duration::ZERO);
        drop(rx);
        assert!(!inbox.deliver(msg(1, 1.0)));
    }

    #[test]
    fn payload_downcast_is_type_checked() {
        let m = msg(7, 3.5);
        assert!(m.payload::<i32>().is_none());
        let m = m.into_payload::<i32>().unwrap_err();
        assert_eq!(*m.into_payload::<f64>().unwrap(), 3.5);
    }
}
