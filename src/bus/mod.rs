//! Typed publish/subscribe message bus.
//!
//! The bus is a process-wide directory from [`TopicId`] (FNV-1a of the topic
//! name) to type-erased topic handles. Registration is insertion-only: a
//! topic, once registered, is never removed or replaced, so handles stay
//! valid for the life of the process.
//!
//! Locking is two-level: one registry mutex guards the id → handle map and
//! is held only long enough to resolve or insert; each topic's subscriber
//! list has its own lock, so publish and subscribe traffic on unrelated
//! topics never contend.

/// Subscriber inboxes and the type-erased message envelope.
pub mod mailbox;
/// Topics and topic identifiers.
pub mod topic;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::{BusError, BusResult};

pub use mailbox::{mailbox, BusMsg, Inbox, Mailbox, MailboxReceiver};
pub use topic::{JsonCodec, Topic, TopicId};

use topic::{BusTopic, TopicCore};

/// Process-wide topic registry and dispatch surface.
///
/// Most applications use [`MsgBus::global`]; tests and multi-tenant setups
/// can instantiate isolated buses.
pub struct MsgBus {
    topics: Mutex<HashMap<TopicId, Arc<dyn BusTopic>>>,
}

impl MsgBus {
    /// Creates an empty, isolated bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide bus instance.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<MsgBus> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Registers a topic under the FNV-1a hash of its name.
    ///
    /// Registration is permanent; there is no unregister operation.
    ///
    /// # Errors
    ///
    /// - [`BusError::ZeroTopic`] for an empty topic name
    /// - [`BusError::TopicExists`] when the id is already taken (the original
    ///   registration is left intact)
    pub fn register<T: Clone + Send + Sync + 'static>(&self, topic: &Topic<T>) -> BusResult<()> {
        if topic.name().is_empty() {
            return Err(BusError::ZeroTopic);
        }

        let core = topic.core();
        let mut topics = self.lock_registry();
        if let Some(existing) = topics.get(&topic.id()) {
            return Err(BusError::TopicExists {
                name: existing.name().to_string(),
            });
        }
        topics.insert(topic.id(), core);
        drop(topics);

        log::debug!("registered topic {} ({})", topic.name(), topic.id());
        Ok(())
    }

    /// Subscribes `(inbox, msg_id)` to a topic.
    ///
    /// The same inbox may subscribe multiple times under different ids;
    /// resubscribing an identical pair is rejected.
    ///
    /// # Errors
    ///
    /// [`BusError::TopicNotFound`], or [`BusError::SubExists`] for a
    /// duplicate pair.
    pub fn subscribe(&self, id: TopicId, inbox: Arc<dyn Inbox>, msg_id: u32) -> BusResult<()> {
        self.resolve(id)?.subscribe(inbox, msg_id)
    }

    /// Removes the `(inbox, msg_id)` subscription from a topic.
    ///
    /// # Errors
    ///
    /// [`BusError::TopicNotFound`], or [`BusError::SubNotFound`] when the
    /// pair is not subscribed.
    pub fn unsubscribe(&self, id: TopicId, inbox: &Arc<dyn Inbox>, msg_id: u32) -> BusResult<()> {
        self.resolve(id)?.unsubscribe(inbox, msg_id)
    }

    /// Routes an external write request to a topic's validation hook.
    ///
    /// A successful write does not notify subscribers; the owning task
    /// applies the value and publishes on its own schedule.
    ///
    /// # Errors
    ///
    /// [`BusError::TopicNotFound`], [`BusError::TypeMismatch`] when the topic
    /// holds a different payload type, [`BusError::WriteNotSupported`] when
    /// no hook is installed, or [`BusError::WriteFailed`] on rejection.
    pub fn request_write<T: Clone + Send + Sync + 'static>(
        &self,
        id: TopicId,
        value: &T,
    ) -> BusResult<()> {
        let handle = self.resolve(id)?;
        let core = handle
            .as_any()
            .downcast_ref::<TopicCore<T>>()
            .ok_or(BusError::TypeMismatch { id })?;
        core.request_write(value)
    }

    /// Routes an external write request supplied as JSON text through the
    /// topic's codec and validation hook.
    ///
    /// # Errors
    ///
    /// As [`MsgBus::request_write`], plus [`BusError::JsonParseFailed`] when
    /// the codec rejects the text; [`BusError::WriteNotSupported`] also
    /// covers a missing codec.
    pub fn request_write_json(&self, id: TopicId, text: &str) -> BusResult<()> {
        self.resolve(id)?.write_json(text)
    }

    /// Reads a topic's last-published value as JSON.
    ///
    /// Returns `Ok(None)` before the first publication.
    ///
    /// # Errors
    ///
    /// [`BusError::TopicNotFound`], [`BusError::WriteNotSupported`] when the
    /// topic has no codec, or [`BusError::JsonParseFailed`] when encoding
    /// fails.
    pub fn read_json(&self, id: TopicId) -> BusResult<Option<String>> {
        self.resolve(id)?.read_json()
    }

    /// True when a topic is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: TopicId) -> bool {
        self.lock_registry().contains_key(&id)
    }

    /// The registered name behind `id`, if any.
    #[must_use]
    pub fn topic_name(&self, id: TopicId) -> Option<String> {
        self.lock_registry().get(&id).map(|t| t.name().to_string())
    }

    /// Number of registered topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_registry().len()
    }

    /// True when no topics are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_registry().is_empty()
    }

    /// Resolves an id to its handle, holding the registry lock only for the
    /// lookup.
    fn resolve(&self, id: TopicId) -> BusResult<Arc<dyn BusTopic>> {
        self.lock_registry()
            .get(&id)
            .map(Arc::clone)
            .ok_or(BusError::TopicNotFound { id })
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, HashMap<TopicId, Arc<dyn BusTopic>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MsgBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MsgBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgBus")
            .field("topics", &self.len())
            .finish()
    }
}
