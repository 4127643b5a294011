/// Geometry re-exports, colours, and the device pixel ratio.
pub mod core;
/// Crate error type.
pub mod error;
