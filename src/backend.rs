// this_file: src/backend.rs
//! Capabilities the cache consumes but does not implement
//!
//! The service resolves fonts, shapes strings and rasterizes glyphs through
//! these traits; the caches only ever see the results.

use crate::error::Result;
use crate::fonts::{FontFaceId, FontHandle};
use crate::identity::RenderSettings;
use crate::rasterize::RenderedGlyph;
use crate::shaping::GlyphRun;

/// Resolves a face id to font bytes.
pub trait FontProvider: Send + Sync {
    fn font(&self, id: FontFaceId) -> Result<FontHandle>;
}

/// Produces a glyph image for a glyph or character index.
pub trait Rasterizer: Send + Sync {
    fn render(
        &self,
        font: &FontHandle,
        index: u32,
        is_glyph_index: bool,
        settings: &RenderSettings,
    ) -> Result<RenderedGlyph>;
}

/// Turns UTF-16 text (or raw glyph indices) into a positioned glyph run.
pub trait Shaper: Send + Sync {
    fn shape(
        &self,
        font: &FontHandle,
        text: &[u16],
        is_glyph_index: bool,
        settings: &RenderSettings,
    ) -> Result<GlyphRun>;
}
