// this_file: src/run_cache.rs

//! Two-level cache of shaped glyph runs.
//!
//! Runs are keyed by string identity, then by render trait. Recency is
//! tracked per string only: when the [`LruIndex`] evicts a string, every
//! trait variant stored under it goes with it. The nested map and the index
//! change together, so one `RwLock` guards both.
//!
//! Lookups hand out `Arc`s, which keeps a run alive for a reader even if the
//! string is evicted while the reader is still using it.

use crate::identity::{RenderTrait, StringIdentity};
use crate::lru_index::LruIndex;
use log::{debug, trace, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type TraitRuns<G> = HashMap<RenderTrait, Arc<G>>;

struct RunStore<G> {
    lru: LruIndex,
    runs: HashMap<StringIdentity, TraitRuns<G>>,
}

/// Counters exposed for observability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GlyphRunCacheStats {
    pub strings: usize,
    pub runs: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU-bounded cache of glyph runs.
pub struct GlyphRunCache<G> {
    store: RwLock<RunStore<G>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<G> GlyphRunCache<G> {
    /// Create a cache tracking up to `capacity` strings (clamped to `1..=2^24`).
    pub fn new(capacity: usize) -> Self {
        Self {
            store: RwLock::new(RunStore {
                lru: LruIndex::new(capacity),
                runs: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RunStore<G>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunStore<G>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Probe for a run. Does not touch recency order.
    pub fn lookup(&self, string_id: StringIdentity, render_trait: RenderTrait) -> Option<Arc<G>> {
        let store = self.read();
        let hit = store
            .runs
            .get(&string_id)
            .and_then(|traits| traits.get(&render_trait))
            .cloned();
        drop(store);

        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Insert `run` for `(string_id, render_trait)`.
    ///
    /// The string is offered to the LRU index first; if that evicts another
    /// string, all of its runs are dropped. When a run already exists for the
    /// key the new one is not adopted and comes back in `Err`, leaving the
    /// cached run untouched. On success the adopted run is returned shared.
    pub fn store(
        &self,
        string_id: StringIdentity,
        render_trait: RenderTrait,
        run: G,
    ) -> Result<Arc<G>, G> {
        let mut store = self.write();
        let store = &mut *store;

        if let Some(evicted) = store.lru.offer(string_id) {
            match store.runs.remove(&evicted) {
                Some(traits) => {
                    debug!(
                        "evicted string {} with {} glyph run(s)",
                        evicted,
                        traits.len()
                    );
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => warn!("evicted string {} had no glyph runs", evicted),
            }
        }

        let traits = store.runs.entry(string_id).or_default();
        if traits.contains_key(&render_trait) {
            trace!("duplicate glyph run for {} / {}", string_id, render_trait);
            return Err(run);
        }
        let run = Arc::new(run);
        traits.insert(render_trait, Arc::clone(&run));
        Ok(run)
    }

    /// Drop every cached run and forget recency.
    pub fn clear(&self) {
        let mut store = self.write();
        store.runs.clear();
        store.lru.clear();
    }

    pub fn len_strings(&self) -> usize {
        self.read().runs.len()
    }

    pub fn len_runs(&self) -> usize {
        self.read().runs.values().map(HashMap::len).sum()
    }

    pub fn capacity(&self) -> usize {
        self.read().lru.capacity()
    }

    pub fn stats(&self) -> GlyphRunCacheStats {
        let store = self.read();
        GlyphRunCacheStats {
            strings: store.runs.len(),
            runs: store.runs.values().map(HashMap::len).sum(),
            capacity: store.lru.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
