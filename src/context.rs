// this_file: src/context.rs
//! Cache context shared by request handlers
//!
//! One context is built at service startup and handed to every worker by
//! reference (or behind an `Arc`). Dropping it releases every cached glyph
//! and glyph run.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::glyph_cache::{GlyphCache, GlyphCacheStats, GlyphLookup};
use crate::identity::{self, GlyphIdentity, RenderTrait, StringIdentity};
use crate::run_cache::{GlyphRunCache, GlyphRunCacheStats};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Combined statistics of both cache tiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub glyphs: GlyphCacheStats,
    pub glyph_runs: GlyphRunCacheStats,
}

/// Glyph cache plus glyph-run cache.
///
/// `R` is the rendered glyph resource, `G` the shaped glyph run.
pub struct CacheContext<R, G> {
    glyphs: GlyphCache<R>,
    runs: GlyphRunCache<G>,
}

impl<R, G> CacheContext<R, G> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.capacity())
    }

    pub fn with_capacity(run_capacity: usize) -> Self {
        let runs = GlyphRunCache::new(run_capacity);
        info!("Cache context ready, glyph-run capacity {} strings", runs.capacity());
        Self {
            glyphs: GlyphCache::new(),
            runs,
        }
    }

    pub fn compute_string_identity(content: &[u16], is_glyph_index: bool) -> StringIdentity {
        identity::string_id(content, is_glyph_index)
    }

    pub fn compute_glyph_identity(
        render_trait: RenderTrait,
        index: u32,
        is_glyph_index: bool,
    ) -> GlyphIdentity {
        identity::glyph_id(render_trait, index, is_glyph_index)
    }

    /// See [`GlyphCache::lookup`].
    pub fn lookup_glyph(&self, id: GlyphIdentity) -> GlyphLookup<R> {
        self.glyphs.lookup(id)
    }

    /// See [`GlyphCache::store`].
    pub fn store_glyph(&self, id: GlyphIdentity, resource: Option<R>) -> Result<bool> {
        self.glyphs.store(id, resource)
    }

    /// See [`GlyphCache::get_or_render`].
    pub fn glyph_or_render<F>(&self, id: GlyphIdentity, render: F) -> GlyphLookup<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.glyphs.get_or_render(id, render)
    }

    /// See [`GlyphRunCache::lookup`].
    pub fn lookup_glyph_run(
        &self,
        string_id: StringIdentity,
        render_trait: RenderTrait,
    ) -> Option<Arc<G>> {
        self.runs.lookup(string_id, render_trait)
    }

    /// See [`GlyphRunCache::store`]. A rejected run is handed back in `Err`.
    pub fn store_glyph_run(
        &self,
        string_id: StringIdentity,
        render_trait: RenderTrait,
        run: G,
    ) -> std::result::Result<Arc<G>, G> {
        self.runs.store(string_id, render_trait, run)
    }

    pub fn glyph_cache(&self) -> &GlyphCache<R> {
        &self.glyphs
    }

    pub fn run_cache(&self) -> &GlyphRunCache<G> {
        &self.runs
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            glyphs: self.glyphs.stats(),
            glyph_runs: self.runs.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::string_id_from_str;

    type Ctx = CacheContext<Vec<u8>, String>;

    #[test]
    fn capacity_follows_config() {
        let config = CacheConfig {
            cache_size_log2: 2,
            ..CacheConfig::default()
        };
        let ctx = Ctx::new(&config);
        assert_eq!(ctx.stats().glyph_runs.capacity, 4);
    }

    #[test]
    fn five_strings_into_capacity_four_evicts_the_first() {
        let ctx = Ctx::with_capacity(4);
        let t0 = RenderTrait::from_bits(7);
        let ids: Vec<_> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|s| string_id_from_str(s, false))
            .collect();
        for (id, name) in ids.iter().zip(["A", "B", "C", "D", "E"]) {
            assert!(ctx.store_glyph_run(*id, t0, name.to_string()).is_ok());
        }

        assert!(ctx.lookup_glyph_run(ids[0], t0).is_none());
        for (id, name) in ids.iter().zip(["A", "B", "C", "D", "E"]).skip(1) {
            assert_eq!(ctx.lookup_glyph_run(*id, t0).unwrap().as_str(), name);
        }
    }

    #[test]
    fn repeated_lookups_leave_state_unchanged() {
        let ctx = Ctx::with_capacity(2);
        let t0 = RenderTrait::from_bits(1);
        let id = string_id_from_str("same", false);
        ctx.store_glyph_run(id, t0, "run".into()).unwrap();

        let before = ctx.stats().glyph_runs;
        let first = ctx.lookup_glyph_run(id, t0).unwrap();
        let second = ctx.lookup_glyph_run(id, t0).unwrap();
        let after = ctx.stats().glyph_runs;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(before.strings, after.strings);
        assert_eq!(before.runs, after.runs);
    }

    #[test]
    fn glyph_round_trip_through_facade() {
        let ctx = Ctx::with_capacity(1);
        let t = RenderTrait::from_bits(3);
        let id = Ctx::compute_glyph_identity(t, 65, false);
        assert!(ctx.lookup_glyph(id).is_pending());
        assert!(ctx.store_glyph(id, Some(vec![0, 255])).unwrap());
        assert_eq!(ctx.lookup_glyph(id).ready().unwrap().as_slice(), &[0, 255]);
        assert_eq!(
            Ctx::compute_string_identity(&[0x48, 0x69], false),
            string_id_from_str("Hi", false)
        );
    }
}
