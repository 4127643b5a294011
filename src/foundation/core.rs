use crate::foundation::error::{RosterError, RosterResult};

pub use kurbo::{Affine, Point, Rect, Size};

/// Straight-alpha RGBA8 colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Construct a colour from straight-alpha channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Construct a fully opaque colour.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Return the same colour with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Premultiplied channel bytes, rounding to nearest.
    pub fn premultiplied(self) -> [u8; 4] {
        let a16 = u16::from(self.a);
        let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }
}

/// Validated device pixel ratio applied once, globally, when rasterizing.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct PixelRatio(f64);

impl PixelRatio {
    /// Largest accepted ratio.
    pub const MAX: f64 = 8.0;

    /// Create a validated ratio in `(0, MAX]`.
    pub fn new(ratio: f64) -> RosterResult<Self> {
        if !ratio.is_finite() || ratio <= 0.0 || ratio > Self::MAX {
            return Err(RosterError::validation(format!(
                "device pixel ratio must be finite and in (0, {}], got {ratio}",
                Self::MAX
            )));
        }
        Ok(Self(ratio))
    }

    /// Ratio as `f64`.
    pub fn get(self) -> f64 {
        self.0
    }

    /// Physical pixel extent for a logical length, rounded up.
    pub fn to_physical(self, logical: f64) -> u32 {
        (logical * self.0).ceil().max(1.0) as u32
    }
}

impl Default for PixelRatio {
    fn default() -> Self {
        Self(1.0)
    }
}
