// this_file: src/shaping.rs
//! Glyph-run production from UTF-16 text
//!
//! `CmapShaper` performs the simple one-to-one shaping a GDI text call needs:
//! each code point goes through the font's character map and advances come
//! from horizontal metrics. No reordering, ligatures or kerning.

use crate::backend::Shaper;
use crate::error::{Error, Result};
use crate::fonts::FontHandle;
use crate::identity::RenderSettings;
use log::debug;
use read_fonts::types::GlyphId;
use serde::Serialize;
use skrifa::instance::{LocationRef, Size};
use skrifa::MetadataProvider;
use smallvec::SmallVec;

/// One positioned glyph inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapedGlyph {
    pub glyph_id: u32,
    /// Index of the first UTF-16 unit this glyph came from
    pub cluster: u32,
    /// Pen position of the glyph origin, in pixels
    pub x: f32,
    pub x_advance: f32,
}

/// Shaped glyph sequence for one string under one render trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlyphRun {
    pub glyphs: SmallVec<[ShapedGlyph; 16]>,
    /// Total advance in pixels
    pub advance: f32,
}

impl GlyphRun {
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    fn push(&mut self, glyph_id: u32, cluster: u32, x_advance: f32) {
        self.glyphs.push(ShapedGlyph {
            glyph_id,
            cluster,
            x: self.advance,
            x_advance,
        });
        self.advance += x_advance;
    }
}

/// Decode UTF-16 into `(cluster, code point)` pairs.
///
/// Unpaired surrogates become U+FFFD.
pub fn decode_utf16_clusters(text: &[u16]) -> Vec<(u32, u32)> {
    let mut out = Vec::with_capacity(text.len());
    let mut offset = 0u32;
    for unit in char::decode_utf16(text.iter().copied()) {
        // A lone surrogate still consumed exactly one unit.
        let (ch, len) = match unit {
            Ok(ch) => (ch, ch.len_utf16() as u32),
            Err(_) => (char::REPLACEMENT_CHARACTER, 1),
        };
        out.push((offset, ch as u32));
        offset += len;
    }
    out
}

/// Character-map shaper.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmapShaper;

impl CmapShaper {
    pub fn new() -> Self {
        Self
    }
}

impl Shaper for CmapShaper {
    fn shape(
        &self,
        font: &FontHandle,
        text: &[u16],
        is_glyph_index: bool,
        settings: &RenderSettings,
    ) -> Result<GlyphRun> {
        let size_px = settings.size_px();
        if size_px <= 0.0 {
            return Err(Error::Shaping(format!(
                "Cannot shape at non-positive size {}",
                size_px
            )));
        }

        let font = font.font_ref()?;
        let metrics = font.glyph_metrics(Size::new(size_px), LocationRef::default());
        let glyph_count = font.metrics(Size::unscaled(), LocationRef::default()).glyph_count;
        let bold = if settings.embolden { 1.0 } else { 0.0 };
        let mut run = GlyphRun::default();

        if is_glyph_index {
            for (cluster, &index) in text.iter().enumerate() {
                if index >= glyph_count {
                    return Err(Error::Shaping(format!(
                        "Glyph index {} out of range (font has {} glyphs)",
                        index, glyph_count
                    )));
                }
                let gid = GlyphId::new(u32::from(index));
                let advance = metrics.advance_width(gid).unwrap_or(0.0) + bold;
                run.push(gid.to_u32(), cluster as u32, advance);
            }
        } else {
            let charmap = font.charmap();
            for (cluster, code_point) in decode_utf16_clusters(text) {
                let gid = charmap.map(code_point).unwrap_or(GlyphId::NOTDEF);
                let advance = metrics.advance_width(gid).unwrap_or(0.0) + bold;
                run.push(gid.to_u32(), cluster, advance);
            }
        }

        debug!(
            "Shaped {} unit(s) into {} glyph(s), advance {:.2}px",
            text.len(),
            run.len(),
            run.advance
        );
        Ok(run)
    }
}
