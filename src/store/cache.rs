//! Assembled-message cache with caller-controlled invalidation.
//!
//! Assembly itself never caches. Callers that want reuse across requests
//! own a [`MessageCache`] and decide when entries go stale.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::model::message::AssembledMessage;

/// Default number of assembled messages to keep.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// LRU map from message id to its assembled record. Safe to share between tasks.
pub struct MessageCache {
    entries: Mutex<LruCache<String, AssembledMessage>>,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl MessageCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, id: &str) -> Option<AssembledMessage> {
        self.lock().get(id).cloned()
    }

    pub fn insert(&self, message: AssembledMessage) {
        self.lock().put(message.id.clone(), message);
    }

    /// Drop one entry. Returns whether it was cached.
    pub fn invalidate(&self, id: &str) -> bool {
        let removed = self.lock().pop(id).is_some();
        debug!(id, removed, "Invalidated cached message");
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, AssembledMessage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
