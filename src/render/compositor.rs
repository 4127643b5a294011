//! CPU compositor drawing the fixed card template with `vello_cpu`.
//!
//! All geometry comes from a [`LayoutTree`] in logical pixels. The device pixel ratio is applied
//! once, as the base transform of every draw call. Rendering reads the model and the image cache
//! and writes only to its own surface and paint caches.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assets::cache::{AssetCache, ImageHandle};
use crate::catalog::asset::Asset;
use crate::foundation::core::{Affine, PixelRatio, Rect, Rgba8};
use crate::foundation::error::{RosterError, RosterResult};
use crate::layout::engine::{CharacterCell, LaneBox, LayoutTree, NoteRegion};
use crate::render::style::{FontSizes, Labels, Palette};
use crate::render::surface::RasterSurface;
use crate::render::text::{
    FixedAdvance, MeasureText, TextBrushRgba8, TextEngine, fit_with_ellipsis, wrap_note,
};
use crate::roster::formation::Lane;
use crate::roster::model::{CharacterSlot, SlotAssignmentModel};

const BORDER_WIDTH: f64 = 1.0;
const DASH: f64 = 6.0;
const DASH_GAP: f64 = 4.0;
const TEXT_INSET: f64 = 6.0;
const GRADIENT_STEPS: u32 = 64;

/// Compositor configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorOpts {
    /// Physical pixels per logical pixel; finite and in `(0, 8]`.
    pub device_pixel_ratio: f64,
    /// TTF/OTF bytes used for all text.
    #[serde(skip)]
    pub font_bytes: Option<Arc<Vec<u8>>>,
    /// Without `font_bytes`, draw text with an installed sans-serif face. When this is off or no
    /// face is found, text is skipped and note wrapping falls back to fixed-advance measurement.
    pub system_font: bool,
    /// Font sizes in logical pixels.
    pub font_sizes: FontSizes,
    /// Localizable strings.
    pub labels: Labels,
    /// Colours.
    pub palette: Palette,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            font_bytes: None,
            system_font: true,
            font_sizes: FontSizes::default(),
            labels: Labels::default(),
            palette: Palette::default(),
        }
    }
}

impl CompositorOpts {
    /// Return options with a different device pixel ratio.
    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Return options drawing text with `font_bytes`.
    pub fn with_font_bytes(mut self, font_bytes: impl Into<Vec<u8>>) -> Self {
        self.font_bytes = Some(Arc::new(font_bytes.into()));
        self
    }

    /// Return options that do or do not fall back to a system font.
    pub fn with_system_font(mut self, enabled: bool) -> Self {
        self.system_font = enabled;
        self
    }

    /// Return options with different labels.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Return options with a different palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    fn validate_font_sizes(&self) -> RosterResult<()> {
        let s = self.font_sizes;
        for (name, v) in [
            ("name", s.name),
            ("hint", s.hint),
            ("lane", s.lane),
            ("title", s.title),
            ("body", s.body),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(RosterError::validation(format!(
                    "font size {name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Align {
    Start,
    Center,
}

struct ImagePaint {
    paint: vello_cpu::Image,
    width: f64,
    height: f64,
}

/// Draws a roster card onto a [`RasterSurface`].
pub struct Compositor {
    ratio: PixelRatio,
    opts: CompositorOpts,
    text: Option<TextEngine>,
    fallback: FixedAdvance,
    base: Affine,
    image_paints: HashMap<String, ImagePaint>,
    gradient_paints: HashMap<Lane, vello_cpu::Image>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("ratio", &self.ratio)
            .field("text", &self.text)
            .field("image_paints", &self.image_paints.len())
            .finish_non_exhaustive()
    }
}

impl Compositor {
    /// Validate `opts` and register the font, if any.
    pub fn new(opts: CompositorOpts) -> RosterResult<Self> {
        let ratio = PixelRatio::new(opts.device_pixel_ratio)?;
        opts.validate_font_sizes()?;
        let text = match opts.font_bytes.as_deref() {
            Some(bytes) => Some(TextEngine::from_font_bytes(bytes)?),
            None if opts.system_font => TextEngine::from_system_fonts(),
            None => None,
        };
        if text.is_none() {
            tracing::warn!("compositor has no font; text will not be drawn");
        }
        Ok(Self {
            ratio,
            base: Affine::scale(ratio.get()),
            opts,
            text,
            fallback: FixedAdvance::default(),
            image_paints: HashMap::new(),
            gradient_paints: HashMap::new(),
        })
    }

    /// Device pixel ratio in use.
    pub fn ratio(&self) -> PixelRatio {
        self.ratio
    }

    /// Options in use.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Whether text is drawn.
    pub fn has_font(&self) -> bool {
        self.text.is_some()
    }

    /// Change the device pixel ratio for subsequent renders.
    pub fn set_device_pixel_ratio(&mut self, ratio: f64) -> RosterResult<()> {
        self.ratio = PixelRatio::new(ratio)?;
        self.opts.device_pixel_ratio = ratio;
        self.base = Affine::scale(ratio);
        Ok(())
    }

    /// Note lines exactly as [`Compositor::render`] draws them into `note`.
    pub fn note_lines(&mut self, note: &NoteRegion, text: &str) -> Vec<String> {
        let size = self.opts.font_sizes.body;
        let width = note.body.width() as f32;
        wrap_note(text, width, note.max_lines, size, self.measurer())
    }

    /// Draw the whole card.
    ///
    /// Assigned assets whose image is not resident in `cache` (still loading or failed) are drawn
    /// as placeholders; nothing is awaited.
    #[tracing::instrument(skip_all, fields(width = layout.canvas.width, ratio = self.ratio.get()))]
    pub fn render(
        &mut self,
        layout: &LayoutTree,
        model: &SlotAssignmentModel,
        cache: &AssetCache,
        note: &str,
    ) -> RosterResult<RasterSurface> {
        let width = self.ratio.to_physical(layout.canvas.width);
        let height = self.ratio.to_physical(layout.canvas.height);
        let w: u16 = width
            .try_into()
            .map_err(|_| RosterError::render("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| RosterError::render("surface height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(w, h);
        let canvas = Rect::new(0.0, 0.0, layout.canvas.width, layout.canvas.height);
        self.fill(&mut ctx, canvas, self.opts.palette.background);

        for (cell, slot) in layout.cells.iter().zip(model.slots()) {
            self.draw_cell(&mut ctx, cell, slot, cache)?;
        }
        for (position, lane) in layout.lanes.iter().enumerate() {
            let pet = model.pet_formation().get(position);
            self.draw_lane(&mut ctx, lane, pet, cache)?;
        }
        self.draw_note(&mut ctx, &layout.note, note);

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        RasterSurface::from_premul(
            width,
            height,
            self.ratio,
            pixmap.data_as_u8_slice().to_vec(),
        )
    }

    fn draw_cell(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        cell: &CharacterCell,
        slot: &CharacterSlot,
        cache: &AssetCache,
    ) -> RosterResult<()> {
        let palette = self.opts.palette.clone();
        self.fill(ctx, cell.frame, palette.cell_background);
        self.border(ctx, cell.frame, palette.cell_border);

        self.draw_assignable(ctx, cell.char_image, cell.char_label, slot.char.as_ref(), cache)?;
        self.draw_assignable(ctx, cell.card_image, cell.card_label, slot.card.as_ref(), cache)?;

        self.fill(ctx, cell.equip_row, palette.equip_row);
        let name_size = self.opts.font_sizes.name;
        let hint_size = self.opts.font_sizes.hint;
        for (item, (kind, equip)) in cell.equips.iter().zip(slot.equips.iter()) {
            match equip {
                Some(asset) => {
                    if !self.draw_image(ctx, item.rect, &asset.src, cache)? {
                        self.fill(ctx, item.rect, palette.placeholder);
                        let label = self.fit(&asset.name, item.rect.width(), name_size);
                        self.text(ctx, &label, name_size, palette.text, item.rect, Align::Center);
                    }
                }
                None => {
                    self.fill(ctx, item.rect, palette.equip_empty);
                    let glyph = self.opts.labels.equip_glyph(kind).to_owned();
                    let muted = palette.muted_text;
                    self.text(ctx, &glyph, hint_size, muted, item.rect, Align::Center);
                }
            }
        }
        Ok(())
    }

    /// Image with a name bar, a named placeholder, or the empty-slot hint.
    fn draw_assignable(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        image: Rect,
        bar: Rect,
        asset: Option<&Asset>,
        cache: &AssetCache,
    ) -> RosterResult<()> {
        let palette = self.opts.palette.clone();
        let name_size = self.opts.font_sizes.name;
        let Some(asset) = asset else {
            self.dashed_border(ctx, image, palette.empty_border);
            let hint = self.opts.labels.select_hint.clone();
            let size = self.opts.font_sizes.hint;
            self.text(ctx, &hint, size, palette.muted_text, image, Align::Center);
            return Ok(());
        };

        let label = self.fit(&asset.name, image.width() - 2.0 * TEXT_INSET, name_size);
        if self.draw_image(ctx, image, &asset.src, cache)? {
            self.fill(ctx, bar, palette.name_bar);
            self.text(ctx, &label, name_size, palette.text, bar, Align::Center);
        } else {
            self.fill(ctx, image, palette.placeholder);
            self.text(ctx, &label, name_size, palette.text, image, Align::Center);
        }
        Ok(())
    }

    fn draw_lane(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        lane: &LaneBox,
        pet: Option<&Asset>,
        cache: &AssetCache,
    ) -> RosterResult<()> {
        let palette = self.opts.palette.clone();
        let gradient = self.gradient_paint(lane.lane)?;
        let steps = f64::from(GRADIENT_STEPS);
        ctx.set_transform(affine_to_cpu(
            self.base
                * Affine::translate((lane.frame.x0, lane.frame.y0))
                * Affine::scale_non_uniform(lane.frame.width(), lane.frame.height() / steps),
        ));
        ctx.set_paint(gradient);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, 1.0, steps));

        let icon_side = (lane.label_row.height() - 2.0 * TEXT_INSET).max(0.0);
        let icon = Rect::new(
            lane.label_row.x0 + TEXT_INSET,
            lane.label_row.y0 + TEXT_INSET,
            lane.label_row.x0 + TEXT_INSET + icon_side,
            lane.label_row.y0 + TEXT_INSET + icon_side,
        );
        ctx.set_transform(affine_to_cpu(
            self.base * Affine::translate((icon.x0, icon.y0)) * Affine::scale(icon_side),
        ));
        ctx.set_paint(color(palette.text));
        ctx.fill_path(&lane_icon(lane.lane));

        let label_rect = Rect::new(
            icon.x1 + TEXT_INSET,
            lane.label_row.y0,
            lane.label_row.x1 - TEXT_INSET,
            lane.label_row.y1,
        );
        let label = self.opts.labels.lane(lane.lane).to_owned();
        let size = self.opts.font_sizes.lane;
        self.text(ctx, &label, size, palette.text, label_rect, Align::Start);

        match pet {
            Some(asset) => {
                let name_size = self.opts.font_sizes.name;
                if self.draw_image(ctx, lane.image, &asset.src, cache)? {
                    let max = lane.caption.width() - 2.0 * TEXT_INSET;
                    let caption = self.fit(&asset.name, max, name_size);
                    self.text(ctx, &caption, name_size, palette.text, lane.caption, Align::Center);
                } else {
                    self.fill(ctx, lane.image, palette.placeholder);
                    let max = lane.image.width() - 2.0 * TEXT_INSET;
                    let label = self.fit(&asset.name, max, name_size);
                    self.text(ctx, &label, name_size, palette.text, lane.image, Align::Center);
                }
            }
            None => {
                self.dashed_border(ctx, lane.image, palette.empty_border);
                let glyph = self.opts.labels.empty_pet.clone();
                let size = self.opts.font_sizes.title;
                self.text(ctx, &glyph, size, palette.muted_text, lane.image, Align::Center);
            }
        }
        Ok(())
    }

    fn draw_note(&mut self, ctx: &mut vello_cpu::RenderContext, note: &NoteRegion, text: &str) {
        let palette = self.opts.palette.clone();
        self.fill(ctx, note.frame, palette.note_background);
        self.border(ctx, note.frame, palette.cell_border);

        let title = self.opts.labels.note_title.clone();
        let title_size = self.opts.font_sizes.title;
        self.text(ctx, &title, title_size, palette.text, note.title, Align::Start);

        let body_size = self.opts.font_sizes.body;
        for (i, line) in self.note_lines(note, text).iter().enumerate() {
            let y0 = note.body.y0 + i as f64 * note.line_height;
            let row = Rect::new(note.body.x0, y0, note.body.x1, y0 + note.line_height);
            self.text(ctx, line, body_size, palette.text, row, Align::Start);
        }
    }

    /// Draw `src` contain-fitted and centered in `rect`. Returns `false` when it is not resident.
    fn draw_image(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        rect: Rect,
        src: &str,
        cache: &AssetCache,
    ) -> RosterResult<bool> {
        let Some(handle) = cache.get(src) else {
            return Ok(false);
        };
        let (paint, pw, ph) = {
            let p = self.image_paint(src, &handle)?;
            (p.paint.clone(), p.width, p.height)
        };
        if pw <= 0.0 || ph <= 0.0 {
            return Ok(false);
        }
        let s = (rect.width() / pw).min(rect.height() / ph);
        let x = rect.x0 + (rect.width() - pw * s) / 2.0;
        let y = rect.y0 + (rect.height() - ph * s) / 2.0;

        ctx.set_transform(affine_to_cpu(
            self.base * Affine::translate((x, y)) * Affine::scale(s),
        ));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, pw, ph));
        Ok(true)
    }

    fn image_paint(&mut self, src: &str, handle: &ImageHandle) -> RosterResult<&ImagePaint> {
        if !self.image_paints.contains_key(src) {
            let paint = rgba_premul_to_image(&handle.rgba8_premul, handle.width, handle.height)?;
            self.image_paints.insert(
                src.to_owned(),
                ImagePaint {
                    paint,
                    width: f64::from(handle.width),
                    height: f64::from(handle.height),
                },
            );
        }
        self.image_paints
            .get(src)
            .ok_or_else(|| RosterError::render(format!("image paint for '{src}' missing")))
    }

    fn gradient_paint(&mut self, lane: Lane) -> RosterResult<vello_cpu::Image> {
        if let Some(img) = self.gradient_paints.get(&lane).cloned() {
            return Ok(img);
        }
        let [top, bottom] = self.opts.palette.lane(lane);
        let (start, end) = (top.premultiplied(), bottom.premultiplied());
        let h = GRADIENT_STEPS;
        let h1 = (h - 1) as f32;
        let mut bytes = Vec::with_capacity(h as usize * 4);
        for y in 0..h {
            let t = y as f32 / h1;
            for c in 0..4 {
                let a = f32::from(start[c]);
                let b = f32::from(end[c]);
                bytes.push((a + (b - a) * t).round().clamp(0.0, 255.0) as u8);
            }
        }
        let img = rgba_premul_to_image(&bytes, 1, h)?;
        self.gradient_paints.insert(lane, img.clone());
        Ok(img)
    }

    fn fill(&self, ctx: &mut vello_cpu::RenderContext, rect: Rect, c: Rgba8) {
        ctx.set_transform(affine_to_cpu(self.base));
        ctx.set_paint(color(c));
        ctx.fill_rect(&rect_to_cpu(rect));
    }

    fn border(&self, ctx: &mut vello_cpu::RenderContext, r: Rect, c: Rgba8) {
        let w = BORDER_WIDTH;
        for edge in [
            Rect::new(r.x0, r.y0, r.x1, r.y0 + w),
            Rect::new(r.x0, r.y1 - w, r.x1, r.y1),
            Rect::new(r.x0, r.y0, r.x0 + w, r.y1),
            Rect::new(r.x1 - w, r.y0, r.x1, r.y1),
        ] {
            self.fill(ctx, edge, c);
        }
    }

    fn dashed_border(&self, ctx: &mut vello_cpu::RenderContext, r: Rect, c: Rgba8) {
        let w = BORDER_WIDTH;
        let mut x = r.x0;
        while x < r.x1 {
            let x1 = (x + DASH).min(r.x1);
            self.fill(ctx, Rect::new(x, r.y0, x1, r.y0 + w), c);
            self.fill(ctx, Rect::new(x, r.y1 - w, x1, r.y1), c);
            x += DASH + DASH_GAP;
        }
        let mut y = r.y0;
        while y < r.y1 {
            let y1 = (y + DASH).min(r.y1);
            self.fill(ctx, Rect::new(r.x0, y, r.x0 + w, y1), c);
            self.fill(ctx, Rect::new(r.x1 - w, y, r.x1, y1), c);
            y += DASH + DASH_GAP;
        }
    }

    fn measurer(&mut self) -> &mut dyn MeasureText {
        match &mut self.text {
            Some(engine) => engine as &mut dyn MeasureText,
            None => &mut self.fallback,
        }
    }

    fn fit(&mut self, text: &str, max_width: f64, size: f32) -> String {
        fit_with_ellipsis(text, max_width as f32, size, self.measurer())
    }

    /// Single-line text, vertically centered in `rect`. No-op without a font.
    fn text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        size: f32,
        c: Rgba8,
        rect: Rect,
        align: Align,
    ) {
        let Some(engine) = self.text.as_mut() else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let layout = engine.layout(text, size, TextBrushRgba8::from(c));
        let w = f64::from(layout.width());
        let h = f64::from(layout.height());
        let x = match align {
            Align::Start => rect.x0 + TEXT_INSET,
            Align::Center => rect.center().x - w / 2.0,
        };
        let y = rect.center().y - h / 2.0;

        let font = engine.font().clone();
        ctx.set_transform(affine_to_cpu(self.base * Affine::translate((x, y))));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

/// Chevrons in a unit square, one per lane depth: back 1, mid 2, front 3.
fn lane_icon(lane: Lane) -> vello_cpu::kurbo::BezPath {
    use vello_cpu::kurbo::Point;

    let mut path = vello_cpu::kurbo::BezPath::new();
    let count = lane.index() + 1;
    let step = 0.28;
    let start = (1.0 - (0.3 + step * (count as f64 - 1.0))) / 2.0;
    for i in 0..count {
        let x = start + step * i as f64;
        path.move_to(Point::new(x, 0.2));
        path.line_to(Point::new(x + 0.3, 0.5));
        path.line_to(Point::new(x, 0.8));
        path.close_path();
    }
    path
}

fn color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> RosterResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| RosterError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| RosterError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(RosterError::render("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
        })
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

fn rgba_premul_to_image(
    bytes_premul: &[u8],
    width: u32,
    height: u32,
) -> RosterResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes_premul, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
