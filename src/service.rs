// this_file: src/service.rs
//! Request handling on top of the cache context
//!
//! A request names a string, a render configuration and whether the string
//! holds characters or glyph indices. The service resolves it to a glyph run
//! (shaping only on a run-cache miss), then to one cached glyph image per
//! shaped glyph (rasterizing only on a glyph-cache miss), and composites the
//! images into a single coverage bitmap.

use crate::backend::{FontProvider, Rasterizer, Shaper};
use crate::config::CacheConfig;
use crate::context::{CacheContext, ContextStats};
use crate::error::Result;
use crate::fonts::FontRegistry;
use crate::glyph_cache::GlyphLookup;
use crate::identity::{glyph_id, string_id, RenderSettings};
use crate::logging::Timer;
use crate::rasterize::{compose_line, OutlineRasterizer, RenderedGlyph};
use crate::shaping::{CmapShaper, GlyphRun};
use log::{debug, info, warn};
use std::sync::Arc;

/// One text-drawing request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    /// UTF-16 code units, or glyph indices when `is_glyph_index` is set
    pub text: Vec<u16>,
    pub is_glyph_index: bool,
    pub settings: RenderSettings,
}

impl TextRequest {
    pub fn new(text: &str, settings: RenderSettings) -> Self {
        Self {
            text: text.encode_utf16().collect(),
            is_glyph_index: false,
            settings,
        }
    }

    pub fn glyph_indices(indices: &[u16], settings: RenderSettings) -> Self {
        Self {
            text: indices.to_vec(),
            is_glyph_index: true,
            settings,
        }
    }
}

/// Result of a rendered request.
#[derive(Debug, Clone)]
pub struct RenderedText {
    pub run: Arc<GlyphRun>,
    /// One entry per glyph of `run`; `None` where rasterization failed
    pub glyphs: Vec<Option<Arc<RenderedGlyph>>>,
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bitmap row of the baseline
    pub baseline: i32,
    /// Whether the glyph run came from the cache
    pub run_cached: bool,
}

impl RenderedText {
    pub fn failed_glyphs(&self) -> usize {
        self.glyphs.iter().filter(|g| g.is_none()).count()
    }
}

/// Text rendering front end owning the cache context.
pub struct TextService<P = FontRegistry, S = CmapShaper, Z = OutlineRasterizer> {
    context: CacheContext<RenderedGlyph, GlyphRun>,
    fonts: P,
    shaper: S,
    rasterizer: Z,
}

impl TextService {
    /// Service with the built-in shaper and rasterizer.
    pub fn from_config(config: &CacheConfig, fonts: FontRegistry) -> Self {
        let rasterizer = OutlineRasterizer::new(config.render_filter);
        info!(
            "Text service ready: {} font face(s), render filter {:?}",
            fonts.len(),
            rasterizer.filter()
        );
        Self::new(CacheContext::new(config), fonts, CmapShaper::new(), rasterizer)
    }

    /// The built-in rasterizer, e.g. to inspect its filter.
    pub fn rasterizer(&self) -> &OutlineRasterizer {
        &self.rasterizer
    }
}

impl<P, S, Z> TextService<P, S, Z>
where
    P: FontProvider,
    S: Shaper,
    Z: Rasterizer,
{
    pub fn new(
        context: CacheContext<RenderedGlyph, GlyphRun>,
        fonts: P,
        shaper: S,
        rasterizer: Z,
    ) -> Self {
        Self {
            context,
            fonts,
            shaper,
            rasterizer,
        }
    }

    pub fn context(&self) -> &CacheContext<RenderedGlyph, GlyphRun> {
        &self.context
    }

    pub fn fonts(&self) -> &P {
        &self.fonts
    }

    pub fn stats(&self) -> ContextStats {
        self.context.stats()
    }

    /// Resolve the glyph run for a request, shaping on a miss.
    pub fn glyph_run(&self, request: &TextRequest) -> Result<(Arc<GlyphRun>, bool)> {
        let string_id = string_id(&request.text, request.is_glyph_index);
        let render_trait = request.settings.to_trait();

        if let Some(run) = self.context.lookup_glyph_run(string_id, render_trait) {
            return Ok((run, true));
        }

        let font = self.fonts.font(request.settings.font_face)?;
        let shaped = self.shaper.shape(
            &font,
            &request.text,
            request.is_glyph_index,
            &request.settings,
        )?;
        match self.context.store_glyph_run(string_id, render_trait, shaped) {
            Ok(run) => Ok((run, false)),
            Err(ours) => {
                // Another worker shaped the same string first.
                debug!("glyph run for {} stored concurrently", string_id);
                let run = self
                    .context
                    .lookup_glyph_run(string_id, render_trait)
                    .unwrap_or_else(|| Arc::new(ours));
                Ok((run, false))
            }
        }
    }

    /// Shape, rasterize and composite a request.
    pub fn render(&self, request: &TextRequest) -> Result<RenderedText> {
        let _timer = Timer::new(format!("render {} unit(s)", request.text.len()));
        let (run, run_cached) = self.glyph_run(request)?;
        let render_trait = request.settings.to_trait();

        let font = self.fonts.font(request.settings.font_face)?;
        let mut glyphs = Vec::with_capacity(run.len());
        for shaped in &run.glyphs {
            let id = glyph_id(render_trait, shaped.glyph_id, true);
            let lookup = self.context.glyph_or_render(id, || {
                self.rasterizer
                    .render(&font, shaped.glyph_id, true, &request.settings)
            });
            match lookup {
                GlyphLookup::Ready(glyph) => glyphs.push(Some(glyph)),
                GlyphLookup::Failed => glyphs.push(None),
                GlyphLookup::Pending => {
                    warn!("glyph {} still pending after render", id);
                    glyphs.push(None);
                }
            }
        }

        let placed: Vec<(f32, &RenderedGlyph)> = run
            .glyphs
            .iter()
            .zip(&glyphs)
            .filter_map(|(shaped, glyph)| glyph.as_deref().map(|g| (shaped.x, g)))
            .collect();
        let (bitmap, width, height, baseline) = compose_line(&placed, run.advance);

        Ok(RenderedText {
            run,
            glyphs,
            bitmap,
            width,
            height,
            baseline,
            run_cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fonts::{FontData, FontFaceId, FontHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFonts;

    impl FontProvider for StubFonts {
        fn font(&self, id: FontFaceId) -> Result<FontHandle> {
            Ok(FontHandle {
                id,
                data: Arc::new(FontData::Owned(Vec::new())),
                index: 0,
                path: None,
            })
        }
    }

    /// Maps each unit to glyph `unit`, advance 10px.
    #[derive(Default)]
    struct StubShaper {
        calls: AtomicUsize,
    }

    impl Shaper for StubShaper {
        fn shape(
            &self,
            _font: &FontHandle,
            text: &[u16],
            _is_glyph_index: bool,
            _settings: &RenderSettings,
        ) -> Result<GlyphRun> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut run = GlyphRun::default();
            for (i, &unit) in text.iter().enumerate() {
                run.glyphs.push(crate::shaping::ShapedGlyph {
                    glyph_id: u32::from(unit),
                    cluster: i as u32,
                    x: run.advance,
                    x_advance: 10.0,
                });
                run.advance += 10.0;
            }
            Ok(run)
        }
    }

    /// 2x2 solid squares; glyph 0 has no outline.
    #[derive(Default)]
    struct StubRasterizer {
        calls: AtomicUsize,
    }

    impl Rasterizer for StubRasterizer {
        fn render(
            &self,
            _font: &FontHandle,
            index: u32,
            _is_glyph_index: bool,
            _settings: &RenderSettings,
        ) -> Result<RenderedGlyph> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if index == 0 {
                return Err(Error::Rendering("no outline".into()));
            }
            Ok(RenderedGlyph {
                glyph_id: index,
                width: 2,
                height: 2,
                left: 0,
                top: 2,
                advance_x: 10.0,
                data: vec![255; 4],
            })
        }
    }

    fn service(capacity: usize) -> TextService<StubFonts, StubShaper, StubRasterizer> {
        TextService::new(
            CacheContext::with_capacity(capacity),
            StubFonts,
            StubShaper::default(),
            StubRasterizer::default(),
        )
    }

    #[test]
    fn second_render_hits_both_caches() {
        let svc = service(8);
        let request = TextRequest::new("abca", RenderSettings::new(0, 12.0));

        let first = svc.render(&request).unwrap();
        assert!(!first.run_cached);
        assert_eq!(first.glyphs.len(), 4);
        assert_eq!(svc.rasterizer.calls.load(Ordering::SeqCst), 3);

        let second = svc.render(&request).unwrap();
        assert!(second.run_cached);
        assert!(Arc::ptr_eq(&first.run, &second.run));
        assert_eq!(svc.shaper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(svc.rasterizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!((second.width, second.height), (40, 2));
    }

    #[test]
    fn failed_glyphs_are_not_retried() {
        let svc = service(8);
        let request = TextRequest::glyph_indices(&[0, 5, 0], RenderSettings::new(0, 12.0));
        let rendered = svc.render(&request).unwrap();
        assert_eq!(rendered.failed_glyphs(), 2);
        svc.render(&request).unwrap();
        // glyph 0 once, glyph 5 once
        assert_eq!(svc.rasterizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(svc.stats().glyphs.failures, 1);
    }

    #[test]
    fn different_settings_use_separate_entries() {
        let svc = service(8);
        let small = TextRequest::new("a", RenderSettings::new(0, 12.0));
        let large = TextRequest::new("a", RenderSettings::new(0, 24.0));
        svc.render(&small).unwrap();
        svc.render(&large).unwrap();
        let stats = svc.stats();
        assert_eq!(stats.glyph_runs.strings, 1);
        assert_eq!(stats.glyph_runs.runs, 2);
        assert_eq!(stats.glyphs.entries, 2);
    }

    #[test]
    fn evicted_runs_are_reshaped() {
        let svc = service(1);
        let settings = RenderSettings::new(0, 12.0);
        svc.render(&TextRequest::new("one", settings)).unwrap();
        svc.render(&TextRequest::new("two", settings)).unwrap();
        let again = svc.render(&TextRequest::new("one", settings)).unwrap();
        assert!(!again.run_cached);
        assert_eq!(svc.shaper.calls.load(Ordering::SeqCst), 3);
    }
}
