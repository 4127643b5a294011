//! Text shaping, measurement and the greedy note wrapper.

use std::sync::{Arc, OnceLock};

use crate::foundation::core::Rgba8;
use crate::foundation::error::{RosterError, RosterResult};

/// Brush colour carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrushRgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Width of a single line of text at a font size, in logical pixels.
pub trait MeasureText {
    /// Advance width of `text` laid out on one line.
    fn measure(&mut self, text: &str, size_px: f32) -> f32;
}

/// Measurement without a font: every character advances by `em * size`.
///
/// Used when no font bytes are configured, so wrapping stays deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedAdvance {
    /// Advance per character as a fraction of the font size.
    pub em: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { em: 0.6 }
    }
}

impl MeasureText for FixedAdvance {
    fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * self.em
    }
}

static SYSTEM_FACE: OnceLock<Option<(Arc<Vec<u8>>, u32)>> = OnceLock::new();

const SANS_SERIF_NAMES: [&str; 5] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
];

fn system_sans_serif() -> Option<(Arc<Vec<u8>>, u32)> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let mut families = vec![usvg::fontdb::Family::SansSerif];
    families.extend(SANS_SERIF_NAMES.map(usvg::fontdb::Family::Name));
    let query = usvg::fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let Some(id) = db.query(&query).or_else(|| db.faces().next().map(|f| f.id)) else {
        tracing::warn!("no system fonts found; card text will not be drawn");
        return None;
    };
    db.with_face_data(id, |data, index| (Arc::new(data.to_vec()), index))
}

/// Parley shaping state with one registered font family.
///
/// The font is registered once; every layout afterwards reuses the same contexts.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family: String,
    font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for TextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEngine")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl TextEngine {
    /// Register `font_bytes` (TTF/OTF) and build the shaping contexts.
    pub fn from_font_bytes(font_bytes: &[u8]) -> RosterResult<Self> {
        Self::from_font_face(font_bytes, 0)
    }

    /// Register face `index` of `font_bytes`, which may be a collection (TTC/OTC).
    pub fn from_font_face(font_bytes: &[u8], index: u32) -> RosterResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .iter()
            .find(|(_, fonts)| fonts.iter().any(|f| f.index() == index))
            .or_else(|| families.first())
            .map(|(id, _)| *id)
            .ok_or_else(|| {
                RosterError::validation("no font families registered from font bytes")
            })?;
        let family = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| RosterError::validation("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            index,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family,
            font,
        })
    }

    /// Engine over an installed sans-serif face, or `None` when the system has no usable font.
    ///
    /// The system font database is scanned once per process.
    pub fn from_system_fonts() -> Option<Self> {
        let (bytes, index) = SYSTEM_FACE.get_or_init(system_sans_serif).as_ref()?;
        match Self::from_font_face(bytes, *index) {
            Ok(engine) => {
                tracing::debug!(family = %engine.family, "using system font");
                Some(engine)
            }
            Err(e) => {
                tracing::warn!(error = %e, "system font could not be registered");
                None
            }
        }
    }

    /// Family name of the registered font.
    pub fn family_name(&self) -> &str {
        &self.family
    }

    /// Font handle for glyph drawing.
    pub fn font(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }

    /// Shape `text` on a single unbroken line.
    pub fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout.align(
            None,
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );
        layout
    }
}

impl MeasureText for TextEngine {
    fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        self.layout(text, size_px, TextBrushRgba8::default()).width()
    }
}

/// Greedy word wrap of `text` into at most `max_lines` lines no wider than `max_width`.
///
/// Explicit newlines start new paragraphs; a blank paragraph yields an empty line. Lines break at
/// whitespace. A single word wider than the line is split at character boundaries, and only a
/// lone character wider than `max_width` can produce an overlong line.
pub fn wrap_note(
    text: &str,
    max_width: f32,
    max_lines: usize,
    size_px: f32,
    measure: &mut dyn MeasureText,
) -> Vec<String> {
    let mut lines = Vec::new();
    if max_lines == 0 || !(max_width > 0.0) {
        return lines;
    }

    'paragraphs: for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_owned()
            } else {
                format!("{current} {word}")
            };
            if measure.measure(&candidate, size_px) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                if lines.len() >= max_lines {
                    break 'paragraphs;
                }
            }
            if measure.measure(word, size_px) <= max_width {
                current = word.to_owned();
                continue;
            }

            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if current.is_empty() || measure.measure(&next, size_px) <= max_width {
                    current = next;
                } else {
                    lines.push(std::mem::replace(&mut current, ch.to_string()));
                    if lines.len() >= max_lines {
                        break 'paragraphs;
                    }
                }
            }
        }

        lines.push(current);
        if lines.len() >= max_lines {
            break;
        }
    }

    lines.truncate(max_lines);
    lines
}

/// `text` unchanged when it fits `max_width`, otherwise its longest prefix followed by `…` that
/// fits. Returns an empty string when not even the ellipsis fits.
pub fn fit_with_ellipsis(
    text: &str,
    max_width: f32,
    size_px: f32,
    measure: &mut dyn MeasureText,
) -> String {
    if measure.measure(text, size_px) <= max_width {
        return text.to_owned();
    }
    let chars: Vec<char> = text.trim_end().chars().collect();
    for keep in (0..chars.len()).rev() {
        let mut candidate: String = chars[..keep].iter().collect();
        let trimmed = candidate.trim_end().len();
        candidate.truncate(trimmed);
        candidate.push('…');
        if measure.measure(&candidate, size_px) <= max_width {
            return candidate;
        }
    }
    String::new()
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
