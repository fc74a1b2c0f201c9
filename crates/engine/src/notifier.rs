//! Change notifier
//!
//! Broadcasts the `ChangedKeys` of every committed write transaction to all
//! registered subscribers. Watchers filter notices against their own
//! dependent keys; store-level subscribers see everything.
//!
//! Callbacks are snapshotted before delivery, so a subscriber may
//! subscribe, unsubscribe or write to the store from inside a callback
//! without deadlocking the registry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use graphcache_core::ChangedKeys;
use tracing::trace;

/// Identifies the originator of a write transaction
///
/// A watcher tags the writes of its own network results with its context,
/// and ignores notices carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// Allocate a process-unique context id
    pub fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Handle of one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What a committed write transaction changed
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    /// Exact field keys whose value changed
    pub changed: ChangedKeys,
    /// Originator of the write, if it identified itself
    pub context: Option<ContextId>,
}

/// Subscriber callback
pub type ChangeCallback = Arc<dyn Fn(&ChangeNotice) + Send + Sync>;

/// Registry of change subscribers
pub struct ChangeNotifier {
    subscribers: DashMap<SubscriptionId, ChangeCallback>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        ChangeNotifier {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for every future notice
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(id, Arc::new(callback));
        id
    }

    /// Remove a subscriber
    ///
    /// # Returns
    /// `true` if the subscriber was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Deliver `notice` to every current subscriber
    pub fn publish(&self, notice: &ChangeNotice) {
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        if callbacks.is_empty() {
            trace!(target: "graphcache::watch", changed = notice.changed.len(), "No subscribers for change notice");
            return;
        }
        for callback in callbacks {
            callback(notice);
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
