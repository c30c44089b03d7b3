// this_file: src/lru_index.rs

//! Bounded recency index over string identities.
//!
//! Only keys are tracked; the glyph-run cache keeps the payloads and uses
//! the evicted key reported by [`LruIndex::offer`] to drop them.

use crate::identity::StringIdentity;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Largest capacity the index accepts (2^24 strings).
pub const MAX_CAPACITY: usize = 1 << 24;

#[derive(Debug)]
pub struct LruIndex {
    order: LruCache<StringIdentity, ()>,
}

impl LruIndex {
    /// Create an index holding up to `capacity` strings, clamped to `1..=2^24`.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.clamp(1, MAX_CAPACITY)).unwrap_or(NonZeroUsize::MIN);
        Self {
            order: LruCache::new(cap),
        }
    }

    /// Insert or touch `id`.
    ///
    /// Returns the least recently offered identity when a new key pushed the
    /// index over capacity.
    pub fn offer(&mut self, id: StringIdentity) -> Option<StringIdentity> {
        if self.order.contains(&id) {
            self.order.promote(&id);
            return None;
        }
        self.order.push(id, ()).map(|(evicted, ())| evicted)
    }

    pub fn contains(&self, id: &StringIdentity) -> bool {
        self.order.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.order.cap().get()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}
