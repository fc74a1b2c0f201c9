//! Query watchers
//!
//! A watcher delivers an operation's result, then re-delivers it whenever a
//! committed change touches a field the last result depended on.
//!
//! ## Invalidation
//!
//! - A notice is acted on only if its `ChangedKeys` intersect the watcher's
//!   `DependentKeySet` (any notice, while the dependencies are unknown).
//! - Notices produced by the watcher's own network writes are ignored; the
//!   watcher has already delivered that result.
//! - A re-read equal to the last delivered result is not delivered again,
//!   so concurrent commits converging on one value yield one update.
//! - A re-read that misses triggers a network refetch when
//!   `refetch_on_failed_update` is set, and is skipped otherwise.
//!
//! Once cancelled (explicitly or by dropping the handle) a watcher delivers
//! nothing further, even for a commit already being published.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use graphcache_core::{CacheResult, DataObject, DependentKeySet, Operation};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, warn};

use crate::client::{CachePolicy, ClientInner, GraphResult, ResultSource};
use crate::notifier::{ChangeNotice, ContextId, SubscriptionId};

type ResultCallback = Box<dyn Fn(CacheResult<GraphResult>) + Send + Sync>;

/// Handle of a watched operation
///
/// Dropping the handle cancels the watcher.
pub struct QueryWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    operation: Operation,
    policy: CachePolicy,
    refetch_on_failed_update: bool,
    client: Weak<ClientInner>,
    context: ContextId,
    state: Mutex<WatchState>,
    // Serializes re-read, comparison and delivery; re-entrant so a callback
    // may write to the store on the delivering thread.
    delivery: ReentrantMutex<()>,
    // A relevant change arrived that has not been re-read yet
    stale: AtomicBool,
    on_result: ResultCallback,
    cancelled: AtomicBool,
}

#[derive(Default)]
struct WatchState {
    dependent_keys: Option<DependentKeySet>,
    last: Option<DataObject>,
    subscription: Option<SubscriptionId>,
}

impl QueryWatcher {
    pub(crate) fn start(
        client: &Arc<ClientInner>,
        operation: Operation,
        policy: CachePolicy,
        on_result: ResultCallback,
    ) -> Self {
        let inner = Arc::new(WatcherInner {
            operation,
            policy,
            refetch_on_failed_update: client.store.config().refetch_on_failed_update,
            client: Arc::downgrade(client),
            context: ContextId::next(),
            state: Mutex::new(WatchState::default()),
            delivery: ReentrantMutex::new(()),
            stale: AtomicBool::new(false),
            on_result,
            cancelled: AtomicBool::new(false),
        });

        // Subscribe first so no commit between the initial fetch and the
        // subscription goes unseen.
        let weak = Arc::downgrade(&inner);
        let subscription = client.store.subscribe(move |notice| {
            if let Some(watcher) = weak.upgrade() {
                watcher.on_change(notice);
            }
        });
        inner.state.lock().subscription = Some(subscription);

        debug!(
            target: "graphcache::watch",
            operation = %inner.operation.name,
            policy = ?inner.policy,
            "Watcher started"
        );
        inner.fetch(inner.policy);
        QueryWatcher { inner }
    }

    /// Fetch the operation from the network again, writing the result
    pub fn refetch(&self) {
        self.inner.fetch(CachePolicy::NetworkThenCacheAlways);
    }

    /// Stop delivering results
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the watcher has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Field keys the last delivered result depends on
    pub fn dependent_keys(&self) -> Option<DependentKeySet> {
        self.inner.state.lock().dependent_keys.clone()
    }

    /// The watched operation
    pub fn operation(&self) -> &Operation {
        &self.inner.operation
    }
}

impl Drop for QueryWatcher {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}

impl fmt::Debug for QueryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryWatcher")
            .field("operation", &self.inner.operation.name)
            .field("policy", &self.inner.policy)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl WatcherInner {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn fetch(&self, policy: CachePolicy) {
        if self.is_cancelled() {
            return;
        }
        let Some(client) = self.client.upgrade() else {
            return;
        };
        {
            let _delivery = self.delivery.lock();
            client.fetch(&self.operation, policy, Some(self.context), &mut |result| {
                self.deliver(result)
            });
        }
        self.drain(&client);
    }

    fn on_change(&self, notice: &ChangeNotice) {
        if self.is_cancelled() || notice.context == Some(self.context) {
            return;
        }
        if let Some(keys) = &self.state.lock().dependent_keys {
            if !notice.changed.intersects(keys) {
                return;
            }
        }
        let Some(client) = self.client.upgrade() else {
            return;
        };
        self.stale.store(true, Ordering::SeqCst);
        self.drain(&client);
    }

    /// Refresh until no change is outstanding
    ///
    /// Never blocks on another thread's delivery: if one is in progress, it
    /// picks up the outstanding change when it finishes.
    fn drain(&self, client: &ClientInner) {
        loop {
            let Some(delivery) = self.delivery.try_lock() else {
                return;
            };
            while self.stale.swap(false, Ordering::SeqCst) {
                if self.is_cancelled() {
                    return;
                }
                self.refresh(client);
            }
            drop(delivery);
            if !self.stale.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn refresh(&self, client: &ClientInner) {
        let known_keys = self.state.lock().dependent_keys.is_some();
        match client.store.read_with_dependencies(&self.operation) {
            Ok((data, dependent_keys)) => self.deliver(Ok(GraphResult {
                data,
                source: ResultSource::Cache,
                dependent_keys: Some(dependent_keys),
            })),
            Err(e) if e.is_cache_miss() && known_keys && self.refetch_on_failed_update => {
                warn!(
                    target: "graphcache::watch",
                    operation = %self.operation.name,
                    error = %e,
                    "Watcher re-read failed, refetching"
                );
                let result = client.fetch_from_network(&self.operation, true, Some(self.context));
                if let Err(e) = &result {
                    warn!(
                        target: "graphcache::watch",
                        operation = %self.operation.name,
                        error = %e,
                        "Watcher refetch failed"
                    );
                }
                self.deliver(result);
            }
            Err(e) if e.is_cache_miss() => {
                debug!(
                    target: "graphcache::watch",
                    operation = %self.operation.name,
                    error = %e,
                    "Watcher re-read failed, update skipped"
                );
            }
            Err(e) => self.deliver(Err(e)),
        }
    }

    fn deliver(&self, result: CacheResult<GraphResult>) {
        if self.is_cancelled() {
            return;
        }
        if let Ok(graph) = &result {
            let mut state = self.state.lock();
            if graph.source == ResultSource::Cache && state.last.as_ref() == Some(&graph.data) {
                debug!(
                    target: "graphcache::watch",
                    operation = %self.operation.name,
                    "Unchanged result coalesced"
                );
                if graph.dependent_keys.is_some() {
                    state.dependent_keys = graph.dependent_keys.clone();
                }
                return;
            }
            if graph.dependent_keys.is_some() {
                state.dependent_keys = graph.dependent_keys.clone();
            }
            state.last = Some(graph.data.clone());
        }
        (self.on_result)(result);
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscription = self.state.lock().subscription.take();
        if let (Some(id), Some(client)) = (subscription, self.client.upgrade()) {
            client.store.unsubscribe(id);
        }
        info!(target: "graphcache::watch", operation = %self.operation.name, "Watcher cancelled");
    }
}
