use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

/// In-process mutexes keyed by entity id.
///
/// Entries are created on demand and dropped once no caller holds or
/// waits on them. The guarded state is `()`, so a poisoned lock carries
/// nothing worth rejecting and is simply recovered.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: Uuid, f: impl FnOnce() -> T) -> T {
        let entry = {
            let mut map = self.map();
            Arc::clone(map.entry(key).or_default())
        };

        let result = {
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut map = self.map();
        drop(entry);
        if map.get(&key).is_some_and(|e| Arc::strong_count(e) == 1) {
            map.remove(&key);
        }
        result
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock tables shared by every intake unit of work in the process.
#[derive(Default)]
pub struct IntakeLocks {
    /// Scan analysis runs at most once per attachment.
    pub attachments: KeyedLocks,
    /// Summary planning and write-back are serialized per chat session.
    pub sessions: KeyedLocks,
}
