/// Request-coalescing image cache.
pub mod cache;
/// Raster and SVG decoding.
pub mod decode;
/// Where image bytes come from.
pub mod source;
