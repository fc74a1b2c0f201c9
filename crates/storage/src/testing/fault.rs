//! Fault-injecting record store wrapper

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use graphcache_core::{
    ChangedKeys, Record, RecordKey, RecordSet, RecordStore, StoreError, StoreResult, WriteBatch,
};

#[derive(Debug, Default)]
struct Switches {
    loads: AtomicBool,
    merges: AtomicBool,
    removals: AtomicBool,
    merge_calls: AtomicUsize,
}

/// Shared handle controlling which operations of a `FaultyRecordStore` fail
///
/// Cloning the switch shares it, so a test can keep one half while the
/// store is moved into a transaction manager.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    inner: Arc<Switches>,
}

impl FaultSwitch {
    /// Create a switch with every fault disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads fail (or succeed again)
    pub fn fail_loads(&self, fail: bool) {
        self.inner.loads.store(fail, Ordering::SeqCst);
    }

    /// Make merges fail (or succeed again)
    pub fn fail_merges(&self, fail: bool) {
        self.inner.merges.store(fail, Ordering::SeqCst);
    }

    /// Make removals fail (or succeed again)
    pub fn fail_removals(&self, fail: bool) {
        self.inner.removals.store(fail, Ordering::SeqCst);
    }

    /// Number of merge calls that reached the wrapped store
    pub fn merge_calls(&self) -> usize {
        self.inner.merge_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

/// Record store wrapper that fails on demand
#[derive(Debug)]
pub struct FaultyRecordStore<S> {
    inner: S,
    switch: FaultSwitch,
}

impl<S: RecordStore> FaultyRecordStore<S> {
    /// Wrap `inner`, controlled by `switch`
    pub fn new(inner: S, switch: FaultSwitch) -> Self {
        FaultyRecordStore { inner, switch }
    }
}

impl<S: RecordStore> RecordStore for FaultyRecordStore<S> {
    fn load(&self, keys: &[RecordKey]) -> StoreResult<HashMap<RecordKey, Record>> {
        FaultSwitch::check(&self.switch.inner.loads, "load")?;
        self.inner.load(keys)
    }

    fn merge(&mut self, records: RecordSet) -> StoreResult<ChangedKeys> {
        FaultSwitch::check(&self.switch.inner.merges, "merge")?;
        self.switch.inner.merge_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.merge(records)
    }

    fn remove_record(&mut self, key: &RecordKey) -> StoreResult<Option<Record>> {
        FaultSwitch::check(&self.switch.inner.removals, "remove")?;
        self.inner.remove_record(key)
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<RecordKey>> {
        FaultSwitch::check(&self.switch.inner.loads, "scan")?;
        self.inner.keys_matching(pattern)
    }

    fn clear(&mut self) -> StoreResult<Vec<Record>> {
        FaultSwitch::check(&self.switch.inner.removals, "clear")?;
        self.inner.clear()
    }

    fn all_keys(&self) -> StoreResult<Vec<RecordKey>> {
        FaultSwitch::check(&self.switch.inner.loads, "scan")?;
        self.inner.all_keys()
    }

    /// Fails before touching the wrapped store if any part of `batch` would
    /// hit an injected fault: merges and replacements check the merge
    /// switch, removals and clears the removal switch.
    fn commit(&mut self, batch: WriteBatch) -> StoreResult<()> {
        let writes = !batch.merges.is_empty() || !batch.replacements.is_empty();
        if writes {
            FaultSwitch::check(&self.switch.inner.merges, "merge")?;
        }
        if batch.clear || !batch.removals.is_empty() {
            FaultSwitch::check(&self.switch.inner.removals, "remove")?;
        }
        if writes {
            self.switch.inner.merge_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.commit(batch)
    }
}
