//! Publish/subscribe mechanism for keyed change notifications.
//!
//! Events carry the affected key and nothing else; a subscriber is
//! expected to re-read the authoritative value from the store. Remote
//! events model the host's cross-document storage signal, which does
//! not fire in the originating context and may coalesce rapid writes,
//! so the payload is never trusted to ride on the event.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default buffered events per subscriber before it is dropped.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Where a change originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A write in this process.
    Local,
    /// A write signalled by another context (e.g. another tab).
    Remote,
}

/// A change notification. Carries the key only.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub key: String,
    pub origin: ChangeOrigin,
}

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Handle for receiving change events.
pub struct ChangeHandle {
    pub id: SubscriberId,
    pub receiver: Receiver<ChangeEvent>,
}

impl ChangeHandle {
    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChangeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

struct Subscriber {
    /// Keys this subscriber cares about (None = all keys).
    keys: Option<Vec<String>>,
    sender: Sender<ChangeEvent>,
}

impl Subscriber {
    fn matches(&self, key: &str) -> bool {
        match &self.keys {
            Some(keys) => keys.iter().any(|k| k == key),
            None => true,
        }
    }

    /// Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, event: ChangeEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Broadcasts keyed change events to registered subscribers.
pub struct ChangeBus {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to changes on the given keys (None = every key).
    pub fn subscribe(&self, keys: Option<Vec<String>>) -> ChangeHandle {
        self.subscribe_with_buffer(keys, DEFAULT_BUFFER_SIZE)
    }

    /// Subscribe with a custom buffer size.
    pub fn subscribe_with_buffer(
        &self,
        keys: Option<Vec<String>>,
        buffer_size: usize,
    ) -> ChangeHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size.max(1));

        self.subscribers
            .write()
            .insert(id, Subscriber { keys, sender });

        ChangeHandle { id, receiver }
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().remove(&id);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Publish a local change for `key`.
    pub fn publish(&self, key: &str) {
        self.broadcast(key, ChangeOrigin::Local);
    }

    /// Publish a change signalled from another context.
    pub fn publish_remote(&self, key: &str) {
        self.broadcast(key, ChangeOrigin::Remote);
    }

    /// Internal broadcast. Subscribers that fail to receive are dropped.
    fn broadcast(&self, key: &str, origin: ChangeOrigin) {
        tracing::debug!(key, ?origin, "change published");

        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sub) in subs.iter() {
                if sub.matches(key) {
                    let event = ChangeEvent {
                        key: key.to_string(),
                        origin,
                    };
                    if !sub.try_send(event) {
                        to_remove.push(*id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                subs.remove(&id);
            }
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
