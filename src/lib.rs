// this_file: src/lib.rs
//! Glyphcache - two-tier caching for a shared text rendering service
//!
//! Many clients ask one service to draw the same strings over and over. This
//! crate keeps the expensive intermediate results around:
//! - rendered glyph images, keyed by render configuration plus glyph or
//!   character index, computed exactly once per key even under contention
//! - shaped glyph runs, keyed by string content and render configuration,
//!   bounded by a string-level LRU
//!
//! [`TextService`] ties both caches to a font registry, a cmap shaper and an
//! outline rasterizer.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod fonts;
pub mod glyph_cache;
pub mod identity;
pub mod logging;
pub mod lru_index;
pub mod rasterize;
pub mod run_cache;
pub mod service;
pub mod shaping;

pub use backend::{FontProvider, Rasterizer, Shaper};
pub use config::{CacheConfig, RenderFilter};
pub use context::{CacheContext, ContextStats};
pub use error::{Error, Result};
pub use fonts::{FontFaceId, FontHandle, FontRegistry};
pub use glyph_cache::{GlyphCache, GlyphLookup};
pub use identity::{
    glyph_id, string_id, Antialias, GlyphIdentity, Hinting, RenderSettings, RenderTrait,
    StringIdentity,
};
pub use rasterize::{OutlineRasterizer, RenderedGlyph};
pub use run_cache::GlyphRunCache;
pub use service::{RenderedText, TextRequest, TextService};
pub use shaping::{CmapShaper, GlyphRun, ShapedGlyph};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
