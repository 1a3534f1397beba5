//! Topics: named, typed, single-writer publication points.
//!
//! A [`Topic`] splits in two at construction: the live value stays inside the
//! owner's `Topic<T>` (mutation needs `&mut`, so the single-writer rule is
//! enforced by ownership, not convention), while the shared core — subscriber
//! list, write hook, JSON codec, last-published snapshot — is what the
//! registry holds. Subscribers only ever see copies pushed at `notify` time.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bus::mailbox::{BusMsg, Inbox};
use crate::error::{BusError, BusResult};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable numeric topic identifier: 32-bit FNV-1a of the topic name.
///
/// Collisions are not detected; name uniqueness is the caller's
/// responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TopicId(u32);

impl TopicId {
    /// Hashes a topic name. Usable in const contexts, so ids can live in
    /// statics next to the topic names they identify.
    #[must_use]
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The raw hash value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Application-supplied JSON bridge for one payload type.
///
/// The bus never parses JSON itself; it only invokes these hooks.
pub struct JsonCodec<T> {
    encode: Box<dyn Fn(&T) -> Result<String, String> + Send + Sync>,
    decode: Box<dyn Fn(&str) -> Result<T, String> + Send + Sync>,
}

impl<T> JsonCodec<T> {
    /// Builds a codec from explicit encode/decode hooks.
    pub fn new(
        encode: impl Fn(&T) -> Result<String, String> + Send + Sync + 'static,
        decode: impl Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }

    pub(crate) fn encode(&self, value: &T) -> Result<String, String> {
        (self.encode)(value)
    }

    pub(crate) fn decode(&self, text: &str) -> Result<T, String> {
        (self.decode)(text)
    }
}

impl<T: Serialize + DeserializeOwned> JsonCodec<T> {
    /// The stock serde_json-backed codec.
    #[must_use]
    pub fn serde() -> Self {
        Self::new(
            |value| serde_json::to_string(value).map_err(|e| e.to_string()),
            |text| serde_json::from_str(text).map_err(|e| e.to_string()),
        )
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec").finish_non_exhaustive()
    }
}

type WriteHandler<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    inbox: Arc<dyn Inbox>,
    msg_id: u32,
}

/// Recovers a usable guard from a poisoned mutex.
///
/// The guarded structures (subscriber list, hooks, snapshot) stay consistent
/// under every partial update, so a panic on another task cannot leave them
/// torn.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared half of a topic: everything the bus needs without the live value.
pub(crate) struct TopicCore<T> {
    name: String,
    id: TopicId,
    subs: Mutex<Vec<Subscription>>,
    write_handler: Mutex<Option<WriteHandler<T>>>,
    codec: Mutex<Option<JsonCodec<T>>>,
    last: Mutex<Option<Arc<T>>>,
}

impl<T: Clone + Send + Sync + 'static> TopicCore<T> {
    pub(crate) fn request_write(&self, value: &T) -> BusResult<()> {
        let handler = lock(&self.write_handler);
        match handler.as_ref() {
            None => Err(BusError::WriteNotSupported),
            Some(h) if h(value) => Ok(()),
            Some(_) => {
                log::debug!("topic {}: write rejected by handler", self.name);
                Err(BusError::WriteFailed)
            }
        }
    }
}

/// Type-erased topic handle stored in the registry.
pub(crate) trait BusTopic: Send + Sync {
    fn name(&self) -> &str;
    fn id(&self) -> TopicId;
    fn subscribe(&self, inbox: Arc<dyn Inbox>, msg_id: u32) -> BusResult<()>;
    fn unsubscribe(&self, inbox: &Arc<dyn Inbox>, msg_id: u32) -> BusResult<()>;
    fn write_json(&self, text: &str) -> BusResult<()>;
    fn read_json(&self) -> BusResult<Option<String>>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Clone + Send + Sync + 'static> BusTopic for TopicCore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> TopicId {
        self.id
    }

    fn subscribe(&self, inbox: Arc<dyn Inbox>, msg_id: u32) -> BusResult<()> {
        let mut subs = lock(&self.subs);
        if subs
            .iter()
            .any(|s| s.msg_id == msg_id && Arc::ptr_eq(&s.inbox, &inbox))
        {
            return Err(BusError::SubExists { msg_id });
        }
        subs.push(Subscription { inbox, msg_id });
        Ok(())
    }

    fn unsubscribe(&self, inbox: &Arc<dyn Inbox>, msg_id: u32) -> BusResult<()> {
        let mut subs = lock(&self.subs);
        let pos = subs
            .iter()
            .position(|s| s.msg_id == msg_id && Arc::ptr_eq(&s.inbox, inbox))
            .ok_or(BusError::SubNotFound { msg_id })?;
        subs.remove(pos);
        Ok(())
    }

    fn write_json(&self, text: &str) -> BusResult<()> {
        let codec = lock(&self.codec);
        let value = match codec.as_ref() {
            None => return Err(BusError::WriteNotSupported),
            Some(c) => c.decode(text).map_err(|reason| {
                log::debug!("topic {}: JSON decode failed: {reason}", self.name);
                BusError::JsonParseFailed { reason }
            })?,
        };
        drop(codec);
        self.request_write(&value)
    }

    fn read_json(&self) -> BusResult<Option<String>> {
        let codec = lock(&self.codec);
        let Some(codec) = codec.as_ref() else {
            return Err(BusError::WriteNotSupported);
        };
        match lock(&self.last).as_ref() {
            None => Ok(None),
            Some(value) => codec
                .encode(value)
                .map(Some)
                .map_err(|reason| BusError::JsonParseFailed { reason }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A named, typed publication point owned by exactly one task.
///
/// The owner mutates the value through [`Topic::data`] (or replaces it with
/// [`Topic::publish`]) and fans it out with [`Topic::notify`]. The bus side
/// (subscription, external writes, JSON bridging) goes through the shared
/// core registered with [`MsgBus::register`](crate::bus::MsgBus::register).
pub struct Topic<T> {
    value: T,
    core: Arc<TopicCore<T>>,
}

impl<T: Clone + Send + Sync + 'static> Topic<T> {
    /// Creates a topic with its initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        let name = name.into();
        let id = TopicId::of(&name);
        Self {
            value: initial,
            core: Arc::new(TopicCore {
                name,
                id,
                subs: Mutex::new(Vec::new()),
                write_handler: Mutex::new(None),
                codec: Mutex::new(None),
                last: Mutex::new(None),
            }),
        }
    }

    /// The topic's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The topic's id (FNV-1a of the name).
    #[must_use]
    pub fn id(&self) -> TopicId {
        self.core.id
    }

    /// Mutable access to the live value, for the owning task between
    /// `notify` calls.
    pub fn data(&mut self) -> &mut T {
        &mut self.value
    }

    /// Read access to the live value.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// Installs the validation/apply hook behind
    /// [`MsgBus::request_write`](crate::bus::MsgBus::request_write).
    ///
    /// The hook returns false to reject the value. A successful write does
    /// not notify subscribers: the owning task applies the value and calls
    /// [`Topic::notify`] itself, preserving the single-writer discipline.
    pub fn set_write_handler(&self, handler: impl Fn(&T) -> bool + Send + Sync + 'static) {
        *lock(&self.core.write_handler) = Some(Box::new(handler));
    }

    /// Installs the JSON bridge used by the bus's JSON entry points.
    pub fn set_json_codec(&self, codec: JsonCodec<T>) {
        *lock(&self.core.codec) = Some(codec);
    }

    /// Pushes the current value to every subscriber.
    ///
    /// The subscriber list is snapshotted under its lock and released before
    /// delivery, so subscribe/unsubscribe traffic never waits on a slow
    /// fan-out. Every subscriber is attempted; the return value is the number
    /// of deliveries the receivers did not accept within their bounded wait.
    pub fn notify(&self) -> usize {
        let snapshot: Vec<Subscription> = lock(&self.core.subs).clone();

        let payload = Arc::new(self.value.clone());
        *lock(&self.core.last) = Some(Arc::clone(&payload));

        let mut failed = 0;
        for sub in &snapshot {
            let msg = BusMsg::new(sub.msg_id, Arc::clone(&payload) as Arc<dyn Any + Send + Sync>);
            if !sub.inbox.deliver(msg) {
                failed += 1;
            }
        }
        if failed > 0 {
            log::warn!(
                "topic {}: {failed}/{} deliveries not accepted",
                self.core.name,
                snapshot.len()
            );
        }
        failed
    }

    /// Sets the value and notifies subscribers in one call.
    pub fn publish(&mut self, value: T) -> usize {
        self.value = value;
        self.notify()
    }

    /// Current number of subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.core.subs).len()
    }

    pub(crate) fn core(&self) -> Arc<TopicCore<T>> {
        Arc::clone(&self.core)
    }
}

impl<T: fmt::Debug> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.core.name)
            .field("id", &self.core.id)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mailbox::mailbox;
    use std::time::Duration;

    #[test]
    fn topic_id_is_fnv1a_of_name() {
        // FNV-1a reference vectors.
        assert_eq!(TopicId::of("").raw(), 0x811c_9dc5);
        assert_eq!(TopicId::of("a").raw(), 0xe40c_292c);
        assert_eq!(TopicId::of("foobar").raw(), 0xbf9c_f968);
        assert_eq!(TopicId::of("temp.value"), TopicId::of("temp.value"));
        assert_ne!(TopicId::of("temp.value"), TopicId::of("temp.stats"));
    }

    #[test]
    fn notify_with_zero_subscribers_is_a_noop() {
        let topic = Topic::new("t", 0.0f64);
        assert_eq!(topic.notify(), 0);
    }

    #[test]
    fn notify_pushes_copies_with_subscriber_ids() {
        let mut topic = Topic::new("t", 0i32);
        let (inbox, rx) = mailbox(4, Duration::ZERO);
        topic
            .core()
            .subscribe(inbox.clone(), 7)
            .unwrap();
        topic.core().subscribe(inbox, 8).unwrap();

        *topic.data() = 41;
        assert_eq!(topic.notify(), 0);

        let a = rx.try_recv().unwrap();
        let b = rx.try_recv().unwrap();
        assert_eq!(a.id(), 7);
        assert_eq!(b.id(), 8);
        assert_eq!(a.payload::<i32>(), Some(&41));
        assert_eq!(b.payload::<i32>(), Some(&41));
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let topic = Topic::new("t", 0u8);
        let (inbox, _rx) = mailbox(1, Duration::ZERO);
        let core = topic.core();
        core.subscribe(inbox.clone(), 1).unwrap();
        assert_eq!(
            core.subscribe(inbox.clone(), 1),
            Err(BusError::SubExists { msg_id: 1 })
        );
        // Same receiver, different id: a distinct logical subscription.
        core.subscribe(inbox, 2).unwrap();
        assert_eq!(topic.subscriber_count(), 2);
    }

    #[test]
    fn failed_deliveries_are_counted_not_fatal() {
        let mut topic = Topic::new("t", 0i32);
        let (full, _full_rx) = mailbox(1, Duration::ZERO);
        let (ok, ok_rx) = mailbox(4, Duration::ZERO);
        topic.core().subscribe(full.clone(), 1).unwrap();
        topic.core().subscribe(ok, 2).unwrap();

        // Saturate the first inbox.
        assert!(full.deliver(BusMsg::new(0, Arc::new(0i32))));

        // One delivery fails, the other still lands.
        assert_eq!(topic.publish(5), 1);
        assert_eq!(ok_rx.try_recv().unwrap().payload::<i32>(), Some(&5));
    }

    #[test]
    fn write_handler_gates_external_writes() {
        let topic = Topic::new("t", 0.0f64);
        let core = topic.core();
        assert_eq!(core.request_write(&1.0), Err(BusError::WriteNotSupported));

        topic.set_write_handler(|v| *v >= 0.0);
        assert_eq!(core.request_write(&1.0), Ok(()));
        assert_eq!(core.request_write(&-1.0), Err(BusError::WriteFailed));
    }

    #[test]
    fn json_codec_bridges_reads_and_writes() {
        let mut topic = Topic::new("t", 0.0f64);
        let core = topic.core();

        assert_eq!(core.read_json(), Err(BusError::WriteNotSupported));

        topic.set_json_codec(JsonCodec::serde());
        topic.set_write_handler(|_| true);

        // Nothing published yet.
        assert_eq!(core.read_json(), Ok(None));

        topic.publish(2.5);
        assert_eq!(core.read_json(), Ok(Some("2.5".to_string())));

        assert_eq!(core.write_json("3.5"), Ok(()));
        assert!(matches!(
            core.write_json("not json"),
            Err(BusError::JsonParseFailed { .. })
        ));
    }
}
