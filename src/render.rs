/// Card compositor.
pub mod compositor;
/// Palette, labels, and font sizes.
pub mod style;
/// Drawn raster and PNG export.
pub mod surface;
/// Text shaping and note wrapping.
pub mod text;
