//! Rostercard composes a fixed roster-card template into a PNG.
//!
//! The crate is organized around four pieces:
//!
//! - [`SlotAssignmentModel`] owns the roster: character slots with card and equipment, pet
//!   slots, and two formations with placement rules
//! - [`compute_layout`] turns a canvas width into the template geometry shared by drawing and
//!   hit-testing
//! - [`AssetCache`] loads each image source once, coalescing concurrent requests
//! - [`Compositor`] draws a model snapshot onto a [`RasterSurface`] using whatever images are
//!   resident
//!
//! [`Studio`] ties them together and only draws once the images a snapshot needs have settled.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Image sources, decoding, and the session image cache.
pub mod assets;
/// Read-only asset catalog and equipment classification.
pub mod catalog;
/// Errors and shared primitive types.
pub mod foundation;
/// Template geometry and hit-testing.
pub mod layout;
/// Drawing and PNG export.
pub mod render;
/// Roster slots and formations.
pub mod roster;
/// Session orchestration.
pub mod session;

pub use crate::foundation::core::{Affine, PixelRatio, Point, Rect, Rgba8, Size};
pub use crate::foundation::error::{RosterError, RosterResult};

pub use crate::assets::cache::{
    AssetCache, ImageHandle, ImageRequest, LoadFailure, LoadResult, LoadStatus,
};
pub use crate::assets::decode::{AssetCacheOpts, DecodedImage};
pub use crate::assets::source::{DirSource, ImageSource, MemorySource};
pub use crate::catalog::asset::{Asset, AssetCategory, Catalog, EquipmentClass, EquipmentKind};
pub use crate::layout::cache::LayoutCache;
pub use crate::layout::engine::{
    CharacterCell, EquipCell, HitRegion, HitTarget, LaneBox, LayoutConfig, LayoutTree, NoteRegion,
    compute_layout,
};
pub use crate::render::compositor::{Compositor, CompositorOpts};
pub use crate::render::style::{FontSizes, Labels, Palette};
pub use crate::render::surface::RasterSurface;
pub use crate::render::text::{FixedAdvance, MeasureText, TextEngine, wrap_note};
pub use crate::roster::formation::{
    CharacterFormation, Formation, FormationPolicy, Lane, PetFormation, PolicyViolation,
    PositionState, Transition,
};
pub use crate::roster::model::{
    CHARACTER_SLOTS, CharacterSlot, Equips, PET_SLOTS, SlotAssignmentModel,
};
pub use crate::session::studio::{
    FrameOutcome, LoadBatch, SettledBatch, Studio, StudioOpts,
};
