// this_file: src/rasterize.rs
//! CPU glyph rasterization using skrifa outlines and zeno masks

use crate::backend::Rasterizer;
use crate::config::RenderFilter;
use crate::error::{Error, Result};
use crate::fonts::FontHandle;
use crate::identity::{Antialias, Hinting, RenderSettings};
use log::{debug, trace};
use read_fonts::types::GlyphId;
use serde::Serialize;
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, HintingInstance, OutlinePen, SmoothMode, Target};
use skrifa::MetadataProvider;
use zeno::{Command, Mask, Transform};

/// A single rendered glyph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedGlyph {
    /// Glyph ID
    pub glyph_id: u32,
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Offset from the pen position to the left edge
    pub left: i32,
    /// Distance from the baseline up to the top edge
    pub top: i32,
    /// Horizontal advance in pixels
    pub advance_x: f32,
    /// 8-bit coverage, row-major
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl RenderedGlyph {
    fn empty(glyph_id: u32, advance_x: f32) -> Self {
        Self {
            glyph_id,
            width: 0,
            height: 0,
            left: 0,
            top: 0,
            advance_x,
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rasterizer producing coverage masks from font outlines.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineRasterizer {
    filter: RenderFilter,
}

impl OutlineRasterizer {
    /// Create a rasterizer applying the process-wide `filter`.
    pub fn new(filter: RenderFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> RenderFilter {
        self.filter
    }

    fn hinting_target(settings: &RenderSettings) -> Option<Target> {
        match (settings.hinting, settings.antialias) {
            (Hinting::None, _) => None,
            (Hinting::Light, _) => Some(SmoothMode::Light.into()),
            (Hinting::Full, Antialias::Mono) => Some(Target::Mono),
            (Hinting::Full, Antialias::Gray) => Some(SmoothMode::Normal.into()),
        }
    }
}

impl Rasterizer for OutlineRasterizer {
    fn render(
        &self,
        font: &FontHandle,
        index: u32,
        is_glyph_index: bool,
        settings: &RenderSettings,
    ) -> Result<RenderedGlyph> {
        let size_px = settings.size_px();
        if size_px <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Glyph size must be positive, got {}",
                size_px
            )));
        }

        let font = font.font_ref()?;
        let glyph_id = if is_glyph_index {
            GlyphId::new(index)
        } else {
            font.charmap().map(index).unwrap_or(GlyphId::NOTDEF)
        };
        debug!("Rendering glyph {} at size {}", glyph_id, size_px);

        let size = Size::new(size_px);
        let outlines = font.outline_glyphs();
        let glyph = outlines
            .get(glyph_id)
            .ok_or_else(|| Error::Rendering(format!("Glyph {} not found", glyph_id)))?;

        let mut advance_x = font
            .glyph_metrics(size, LocationRef::default())
            .advance_width(glyph_id)
            .unwrap_or(0.0);
        if settings.embolden {
            advance_x += 1.0;
        }

        let hinting = Self::hinting_target(settings).and_then(|target| {
            HintingInstance::new(&outlines, size, LocationRef::default(), target)
                .map_err(|e| debug!("Hinting unavailable for glyph {}: {}", glyph_id, e))
                .ok()
        });
        let draw_settings = match &hinting {
            Some(instance) => DrawSettings::hinted(instance, false),
            None => DrawSettings::unhinted(size, LocationRef::default()),
        };

        let mut pen = MaskPen::new();
        glyph
            .draw(draw_settings, &mut pen)
            .map_err(|e| Error::Rendering(format!("Failed to extract outline: {:?}", e)))?;

        let Some((x_min, y_min, x_max, y_max)) = pen.bounds() else {
            // Blank glyph such as a space
            return Ok(RenderedGlyph::empty(glyph_id.to_u32(), advance_x));
        };

        // Pen coordinates are already flipped to y-down.
        let left = x_min.floor() as i32;
        let top_px = y_min.floor() as i32;
        let width = (x_max.ceil() as i32 - left).max(1) as u32;
        let height = (y_max.ceil() as i32 - top_px).max(1) as u32;

        let (data, _placement) = Mask::new(&pen.commands[..])
            .transform(Some(Transform::translation(-left as f32, -top_px as f32)))
            .size(width, height)
            .render();

        let mut rendered = RenderedGlyph {
            glyph_id: glyph_id.to_u32(),
            width,
            height,
            left,
            top: -top_px,
            advance_x,
            data,
        };
        if settings.embolden {
            embolden(&mut rendered);
        }
        match settings.antialias {
            Antialias::Mono => threshold(&mut rendered),
            Antialias::Gray => apply_filter(&mut rendered, self.filter),
        }
        trace!(
            "Glyph {} rendered as {}x{} at ({}, {})",
            rendered.glyph_id,
            rendered.width,
            rendered.height,
            rendered.left,
            rendered.top
        );
        Ok(rendered)
    }
}

/// Widen strokes by one pixel to the right.
pub fn embolden(glyph: &mut RenderedGlyph) {
    if glyph.is_empty() {
        return;
    }
    let (w, h) = (glyph.width as usize, glyph.height as usize);
    let new_w = w + 1;
    let mut out = vec![0u8; new_w * h];
    for y in 0..h {
        let src = &glyph.data[y * w..(y + 1) * w];
        for x in 0..new_w {
            let here = if x < w { src[x] } else { 0 };
            let prev = if x > 0 { src[x - 1] } else { 0 };
            out[y * new_w + x] = here.max(prev);
        }
    }
    glyph.width = new_w as u32;
    glyph.data = out;
}

/// Collapse coverage to 0/255.
pub fn threshold(glyph: &mut RenderedGlyph) {
    for px in &mut glyph.data {
        *px = if *px >= 128 { 255 } else { 0 };
    }
}

/// Run the five-tap horizontal filter over the mask.
///
/// The mask grows by two pixels on each side so spread coverage is kept.
pub fn apply_filter(glyph: &mut RenderedGlyph, filter: RenderFilter) {
    let Some(weights) = filter.weights() else {
        return;
    };
    if glyph.is_empty() {
        return;
    }
    let (w, h) = (glyph.width as usize, glyph.height as usize);
    let new_w = w + 4;
    let mut out = vec![0u8; new_w * h];
    for y in 0..h {
        let src = &glyph.data[y * w..(y + 1) * w];
        for x in 0..new_w {
            let mut acc: u32 = 0;
            for (tap, weight) in weights.iter().enumerate() {
                // Output pixel x covers source pixel x - 2; taps span -2..=2.
                let sx = x as isize + tap as isize - 4;
                if (0..w as isize).contains(&sx) {
                    acc += u32::from(src[sx as usize]) * u32::from(*weight);
                }
            }
            out[y * new_w + x] = (acc / 256).min(255) as u8;
        }
    }
    glyph.width = new_w as u32;
    glyph.left -= 2;
    glyph.data = out;
}

/// Composite glyphs placed along a baseline into one coverage bitmap.
///
/// Returns `(bitmap, width, height, baseline)`, where `baseline` is the row
/// of the pen's y origin.
pub fn compose_line(glyphs: &[(f32, &RenderedGlyph)], advance: f32) -> (Vec<u8>, u32, u32, i32) {
    let mut min_x = 0i32;
    let mut max_x = advance.ceil().max(0.0) as i32;
    let mut max_top = i32::MIN;
    let mut min_bottom = i32::MAX;
    for (pen_x, glyph) in glyphs {
        if glyph.is_empty() {
            continue;
        }
        let x0 = pen_x.round() as i32 + glyph.left;
        min_x = min_x.min(x0);
        max_x = max_x.max(x0 + glyph.width as i32);
        max_top = max_top.max(glyph.top);
        min_bottom = min_bottom.min(glyph.top - glyph.height as i32);
    }
    if max_top == i32::MIN {
        return (Vec::new(), 0, 0, 0);
    }

    let width = (max_x - min_x) as u32;
    let height = (max_top - min_bottom) as u32;
    let mut bitmap = vec![0u8; width as usize * height as usize];
    for (pen_x, glyph) in glyphs {
        if glyph.is_empty() {
            continue;
        }
        let x0 = (pen_x.round() as i32 + glyph.left - min_x) as usize;
        let y0 = (max_top - glyph.top) as usize;
        for gy in 0..glyph.height as usize {
            let row = (y0 + gy) * width as usize;
            for gx in 0..glyph.width as usize {
                let fg = glyph.data[gy * glyph.width as usize + gx];
                let dst = &mut bitmap[row + x0 + gx];
                // Coverage union
                *dst = dst.saturating_add(((u16::from(fg) * u16::from(255 - *dst)) / 255) as u8);
            }
        }
    }
    (bitmap, width, height, max_top)
}

/// Collects outline commands, flipping y so the result is y-down.
struct MaskPen {
    commands: Vec<Command>,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl MaskPen {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        }
    }

    fn point(&mut self, x: f32, y: f32) -> (f32, f32) {
        let y = -y;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        (x, y)
    }

    fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        (self.min_x < self.max_x && self.min_y < self.max_y)
            .then_some((self.min_x, self.min_y, self.max_x, self.max_y))
    }
}

impl OutlinePen for MaskPen {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.commands.push(Command::MoveTo(p.into()));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.commands.push(Command::LineTo(p.into()));
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let c = self.point(cx, cy);
        let p = self.point(x, y);
        self.commands.push(Command::QuadTo(c.into(), p.into()));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        let c0 = self.point(cx0, cy0);
        let c1 = self.point(cx1, cy1);
        let p = self.point(x, y);
        self.commands
            .push(Command::CurveTo(c0.into(), c1.into(), p.into()));
    }

    fn close(&mut self) {
        self.commands.push(Command::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(width: u32, height: u32, data: Vec<u8>) -> RenderedGlyph {
        RenderedGlyph {
            glyph_id: 1,
            width,
            height,
            left: 0,
            top: height as i32,
            advance_x: width as f32,
            data,
        }
    }

    #[test]
    fn threshold_makes_mask_binary() {
        let mut g = glyph(4, 1, vec![0, 127, 128, 255]);
        threshold(&mut g);
        assert_eq!(g.data, vec![0, 0, 255, 255]);
    }

    #[test]
    fn embolden_widens_by_one_pixel() {
        let mut g = glyph(3, 1, vec![0, 200, 0]);
        embolden(&mut g);
        assert_eq!(g.width, 4);
        assert_eq!(g.data, vec![0, 200, 200, 0]);
    }

    #[test]
    fn filter_spreads_and_pads() {
        let mut g = glyph(1, 1, vec![255]);
        apply_filter(&mut g, RenderFilter::Light);
        assert_eq!(g.width, 5);
        assert_eq!(g.left, -2);
        assert_eq!(g.data, vec![0, 84, 85, 84, 0]);
    }

    #[test]
    fn no_filter_leaves_mask_alone() {
        let mut g = glyph(2, 1, vec![10, 20]);
        apply_filter(&mut g, RenderFilter::None);
        assert_eq!(g.width, 2);
        assert_eq!(g.data, vec![10, 20]);
    }

    #[test]
    fn compose_line_places_glyphs_by_pen_position() {
        let a = glyph(2, 2, vec![255; 4]);
        let b = glyph(1, 1, vec![100]);
        let (bitmap, width, height, baseline) = compose_line(&[(0.0, &a), (3.0, &b)], 4.0);
        assert_eq!((width, height, baseline), (4, 2, 2));
        assert_eq!(bitmap, vec![255, 255, 0, 0, 255, 255, 0, 100]);
    }

    #[test]
    fn compose_line_of_blank_glyphs_is_empty() {
        let space = RenderedGlyph::empty(3, 5.0);
        let (bitmap, width, height, _) = compose_line(&[(0.0, &space)], 5.0);
        assert!(bitmap.is_empty());
        assert_eq!((width, height), (0, 0));
    }

    #[test]
    fn pen_flips_y_and_tracks_bounds() {
        let mut pen = MaskPen::new();
        pen.move_to(1.0, 2.0);
        pen.line_to(5.0, 8.0);
        pen.close();
        assert_eq!(pen.bounds(), Some((1.0, -8.0, 5.0, -2.0)));
        assert_eq!(pen.commands.len(), 3);
        assert!(MaskPen::new().bounds().is_none());
    }
}
