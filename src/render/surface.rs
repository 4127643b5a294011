use std::io::Cursor;

use anyhow::Context;

use crate::foundation::core::{PixelRatio, Size};
use crate::foundation::error::{RosterError, RosterResult};

/// A drawn card: physical pixels in premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterSurface {
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
    /// Ratio between physical and logical pixels the surface was drawn at.
    pub ratio: PixelRatio,
    /// Premultiplied RGBA8 pixel bytes.
    pub data: Vec<u8>,
}

impl RasterSurface {
    /// Wrap drawn pixels, checking that the buffer matches the dimensions.
    pub fn from_premul(
        width: u32,
        height: u32,
        ratio: PixelRatio,
        data: Vec<u8>,
    ) -> RosterResult<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if data.len() != expected {
            return Err(RosterError::render(format!(
                "surface byte len mismatch: expected {expected}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            ratio,
            data,
        })
    }

    /// Logical size the surface represents.
    pub fn logical_size(&self) -> Size {
        Size::new(
            f64::from(self.width) / self.ratio.get(),
            f64::from(self.height) / self.ratio.get(),
        )
    }

    /// Premultiplied pixel at physical `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Straight-alpha copy of the pixels.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }

    /// Encode the surface as PNG. Reads the drawn pixels only; nothing is re-rendered.
    pub fn to_png(&self) -> RosterResult<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.to_straight_rgba8())
            .ok_or_else(|| RosterError::render("surface buffer does not match its dimensions"))?;
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode surface as png")?;
        Ok(buf)
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
