// this_file: src/glyph_cache.rs

//! Single-flight cache of rendered glyphs.
//!
//! The slot table only decides whether a slot exists; it is a sharded
//! `DashMap`, so the find-or-insert step holds one shard's write lock for the
//! length of a hash probe. Rendering happens outside every map lock. Each
//! slot is a write-once cell: the thread that created it is told to render,
//! every other thread asking for the same identity blocks on the slot's
//! condition variable until `store` publishes the result.
//!
//! Glyph slots are never evicted. They live until the cache is dropped.

use crate::error::{Error, Result};
use crate::identity::GlyphIdentity;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Outcome of [`GlyphCache::lookup`].
#[derive(Debug)]
pub enum GlyphLookup<R> {
    /// The glyph was rendered before (possibly by another thread just now).
    Ready(Arc<R>),
    /// Rendering failed permanently for this identity.
    Failed,
    /// The caller reserved the slot and must render, then call `store`.
    Pending,
}

impl<R> GlyphLookup<R> {
    pub fn is_pending(&self) -> bool {
        matches!(self, GlyphLookup::Pending)
    }

    /// The resource, if the slot completed successfully.
    pub fn ready(self) -> Option<Arc<R>> {
        match self {
            GlyphLookup::Ready(resource) => Some(resource),
            _ => None,
        }
    }
}

impl<R> Clone for GlyphLookup<R> {
    fn clone(&self) -> Self {
        match self {
            GlyphLookup::Ready(resource) => GlyphLookup::Ready(Arc::clone(resource)),
            GlyphLookup::Failed => GlyphLookup::Failed,
            GlyphLookup::Pending => GlyphLookup::Pending,
        }
    }
}

enum SlotState<R> {
    Pending,
    Ready(Arc<R>),
    Failed,
}

struct GlyphSlot<R> {
    state: Mutex<SlotState<R>>,
    done: Condvar,
}

impl<R> GlyphSlot<R> {
    fn pending() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_pending(&self) -> bool {
        matches!(*self.lock(), SlotState::Pending)
    }

    /// Block until the slot leaves the pending state.
    fn wait(&self) -> GlyphLookup<R> {
        let mut state = self.lock();
        while matches!(*state, SlotState::Pending) {
            state = self.done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        match &*state {
            SlotState::Ready(resource) => GlyphLookup::Ready(Arc::clone(resource)),
            _ => GlyphLookup::Failed,
        }
    }

    fn complete(&self, id: GlyphIdentity, resource: Option<R>) -> Result<GlyphLookup<R>> {
        let mut state = self.lock();
        if !matches!(*state, SlotState::Pending) {
            return Err(Error::Protocol(format!(
                "glyph slot {id} completed twice"
            )));
        }
        let outcome = match resource {
            Some(resource) => {
                let resource = Arc::new(resource);
                *state = SlotState::Ready(Arc::clone(&resource));
                GlyphLookup::Ready(resource)
            }
            None => {
                *state = SlotState::Failed;
                GlyphLookup::Failed
            }
        };
        drop(state);
        self.done.notify_all();
        Ok(outcome)
    }
}

/// Counters exposed for observability.
///
/// Every lookup counts once: `misses` for the lookups that reserved a slot,
/// `hits` for the ones that found it (failure markers included). `failures`
/// counts slots completed as failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GlyphCacheStats {
    pub entries: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

/// Concurrent glyph cache keyed by [`GlyphIdentity`].
pub struct GlyphCache<R> {
    slots: DashMap<GlyphIdentity, Arc<GlyphSlot<R>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl<R> GlyphCache<R> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Find the slot for `id`, creating it if needed.
    ///
    /// Exactly one caller per identity gets [`GlyphLookup::Pending`] and must
    /// follow up with [`GlyphCache::store`]. Everyone else blocks until that
    /// happens. A thread holding a pending reservation must not look the same
    /// identity up again before storing it.
    pub fn lookup(&self, id: GlyphIdentity) -> GlyphLookup<R> {
        let slot = match self.slots.entry(id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(GlyphSlot::pending()));
                self.misses.fetch_add(1, Ordering::Relaxed);
                return GlyphLookup::Pending;
            }
        };

        self.hits.fetch_add(1, Ordering::Relaxed);
        slot.wait()
    }

    /// Complete the pending slot for `id`.
    ///
    /// `Some(resource)` is adopted and `Ok(true)` returned; `None` records a
    /// permanent failure and returns `Ok(false)`. Storing into a slot that was
    /// never reserved or is already complete is rejected.
    pub fn store(&self, id: GlyphIdentity, resource: Option<R>) -> Result<bool> {
        self.complete(id, resource)
            .map(|outcome| matches!(outcome, GlyphLookup::Ready(_)))
    }

    fn complete(&self, id: GlyphIdentity, resource: Option<R>) -> Result<GlyphLookup<R>> {
        let slot = match self.slots.get(&id) {
            Some(slot) => Arc::clone(slot.value()),
            None => {
                error!("store for glyph {} without a reserved slot", id);
                return Err(Error::Protocol(format!("glyph slot {id} was never reserved")));
            }
        };

        let failed = resource.is_none();
        let outcome = slot.complete(id, resource).map_err(|e| {
            error!("{}", e);
            e
        })?;
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
            debug!("glyph {} marked as permanently failed", id);
        }
        Ok(outcome)
    }

    /// Look `id` up and, if this caller reserved it, run `render` and publish
    /// the result. Errors from `render` become a permanent failure marker.
    ///
    /// If `render` panics the slot is completed as failed before unwinding
    /// continues, so waiters are released.
    pub fn get_or_render<F>(&self, id: GlyphIdentity, render: F) -> GlyphLookup<R>
    where
        F: FnOnce() -> Result<R>,
    {
        match self.lookup(id) {
            GlyphLookup::Pending => {}
            done => return done,
        }

        let reservation = Reservation { cache: self, id };
        let resource = match render() {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!("rendering glyph {} failed: {}", id, e);
                None
            }
        };
        std::mem::forget(reservation);
        match self.complete(id, resource) {
            Ok(outcome) => outcome,
            // Someone stored into our reservation; report what they published.
            Err(_) => self.published(id),
        }
    }

    fn published(&self, id: GlyphIdentity) -> GlyphLookup<R> {
        let slot = self.slots.get(&id).map(|slot| Arc::clone(slot.value()));
        match slot {
            Some(slot) => slot.wait(),
            None => GlyphLookup::Failed,
        }
    }

    /// Number of slots, pending ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots still waiting for `store`.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().is_pending()).count()
    }

    pub fn stats(&self) -> GlyphCacheStats {
        GlyphCacheStats {
            entries: self.len(),
            pending: self.pending(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl<R> Default for GlyphCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Drop for GlyphCache<R> {
    fn drop(&mut self) {
        // Completed resources are released with their slots. A pending slot
        // here means shutdown raced an in-flight render.
        let pending = self.pending();
        if pending > 0 {
            warn!("glyph cache dropped with {} pending slot(s)", pending);
        }
        debug!("releasing {} glyph slot(s)", self.slots.len());
    }
}

/// Marks a reserved slot as failed if the renderer unwinds.
struct Reservation<'a, R> {
    cache: &'a GlyphCache<R>,
    id: GlyphIdentity,
}

impl<R> Drop for Reservation<'_, R> {
    fn drop(&mut self) {
        let _ = self.cache.complete(self.id, None);
    }
}
