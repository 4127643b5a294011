use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{RosterError, RosterResult};

/// Decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl DecodedImage {
    /// Bytes held by the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.rgba8_premul.len()
    }
}

/// Decoding limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetCacheOpts {
    /// Scale applied to an SVG's intrinsic size when rasterizing it.
    pub svg_raster_scale: f32,
    /// Larger images are downscaled (aspect preserved) to fit this many pixels per side.
    pub max_dimension: u32,
}

impl Default for AssetCacheOpts {
    fn default() -> Self {
        Self {
            svg_raster_scale: 2.0,
            max_dimension: 4096,
        }
    }
}

impl AssetCacheOpts {
    /// Return options with a different SVG raster scale.
    pub fn with_svg_raster_scale(mut self, scale: f32) -> Self {
        self.svg_raster_scale = scale;
        self
    }

    /// Return options with a different maximum dimension.
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }
}

/// Decode bytes fetched for `src`, choosing SVG rasterization for `.svg` sources.
pub fn decode_for_src(
    src: &str,
    bytes: &[u8],
    opts: &AssetCacheOpts,
) -> RosterResult<DecodedImage> {
    let is_svg = src
        .rsplit('.')
        .next()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        rasterize_svg(bytes, opts)
    } else {
        decode_image(bytes, opts.max_dimension)
    }
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8], max_dimension: u32) -> RosterResult<DecodedImage> {
    let mut dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    if dyn_img.width() > max_dimension || dyn_img.height() > max_dimension {
        dyn_img = dyn_img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        );
    }
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Parse SVG bytes and rasterize them at `svg_raster_scale` times their intrinsic size.
pub fn rasterize_svg(bytes: &[u8], opts: &AssetCacheOpts) -> RosterResult<DecodedImage> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).context("parse svg tree")?;

    let scale = opts.svg_raster_scale;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RosterError::validation("svg raster scale must be finite and > 0"));
    }
    let size = tree.size();
    let max = opts.max_dimension as f32;
    let fit = (max / (size.width() * scale))
        .min(max / (size.height() * scale))
        .min(1.0);
    let width = ((size.width() * scale * fit).ceil() as u32).max(1);
    let height = ((size.height() * scale * fit).ceil() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| RosterError::render("failed to allocate svg pixmap"))?;
    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(pixmap.data().to_vec()),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
