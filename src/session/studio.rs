//! Session orchestration: edits, load batches, and deferred rendering.
//!
//! A frame is drawn only after every source the current model needs has finished loading or
//! failed. [`Studio::begin_batch`] snapshots that working set as shared load requests;
//! [`LoadBatch::settle`] waits for all of them; [`Studio::finish`] draws, unless the model, note,
//! width or pixel ratio changed since the batch began, in which case the batch is stale and a new
//! one must be begun. Loads started by a stale batch stay in the cache and are reused.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::assets::cache::{AssetCache, ImageRequest};
use crate::assets::decode::AssetCacheOpts;
use crate::assets::source::ImageSource;
use crate::foundation::core::Point;
use crate::foundation::error::RosterResult;
use crate::layout::cache::LayoutCache;
use crate::layout::engine::{HitTarget, LayoutConfig, LayoutTree};
use crate::render::compositor::{Compositor, CompositorOpts};
use crate::render::surface::RasterSurface;
use crate::roster::model::SlotAssignmentModel;
use crate::session::fingerprint::{SceneFingerprint, fingerprint_scene};

/// Environment variable overriding [`CompositorOpts::device_pixel_ratio`].
pub const DEVICE_PIXEL_RATIO_ENV: &str = "ROSTERCARD_DEVICE_PIXEL_RATIO";

/// Session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioOpts {
    /// Logical canvas width.
    pub canvas_width: f64,
    /// Template constants.
    pub layout: LayoutConfig,
    /// Drawing options.
    pub compositor: CompositorOpts,
    /// Decoding limits.
    pub assets: AssetCacheOpts,
}

impl Default for StudioOpts {
    fn default() -> Self {
        Self {
            canvas_width: 1200.0,
            layout: LayoutConfig::default(),
            compositor: CompositorOpts::default(),
            assets: AssetCacheOpts::default(),
        }
    }
}

impl StudioOpts {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> RosterResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Return options with a different canvas width.
    pub fn with_canvas_width(mut self, width: f64) -> Self {
        self.canvas_width = width;
        self
    }

    /// Return options with different drawing options.
    pub fn with_compositor(mut self, compositor: CompositorOpts) -> Self {
        self.compositor = compositor;
        self
    }

    /// Return options with different template constants.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Return options with different decoding limits.
    pub fn with_assets(mut self, assets: AssetCacheOpts) -> Self {
        self.assets = assets;
        self
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Unparsable or non-positive values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ratio) = lookup(DEVICE_PIXEL_RATIO_ENV)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|r| r.is_finite() && *r > 0.0)
        {
            self.compositor.device_pixel_ratio = ratio;
        }
        self
    }
}

/// Result of finishing a settled batch.
#[derive(Clone, Debug)]
pub enum FrameOutcome {
    /// The card as of the batch's generation.
    Drawn(Arc<RasterSurface>),
    /// Inputs changed after the batch began; begin a new batch.
    Stale,
}

/// Shared load requests for one working set of sources.
#[must_use = "a batch does nothing until settled"]
pub struct LoadBatch {
    generation: u64,
    requests: Vec<(String, ImageRequest)>,
}

impl std::fmt::Debug for LoadBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBatch")
            .field("generation", &self.generation)
            .field("sources", &self.sources().collect::<Vec<_>>())
            .finish()
    }
}

impl LoadBatch {
    /// Studio generation the batch was begun at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sources in the working set.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|(src, _)| src.as_str())
    }

    /// Number of sources in the working set.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the working set is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Wait until every request has resolved or failed.
    #[tracing::instrument(
        skip_all,
        fields(generation = self.generation, sources = self.requests.len())
    )]
    pub async fn settle(self) -> SettledBatch {
        let results = join_all(self.requests.into_iter().map(|(_, req)| req)).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        SettledBatch {
            generation: self.generation,
            loaded: results.len() - failed,
            failed,
        }
    }
}

/// A batch whose loads have all finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettledBatch {
    /// Generation the batch was begun at.
    pub generation: u64,
    /// Sources that are resident.
    pub loaded: usize,
    /// Sources that failed and will draw as placeholders.
    pub failed: usize,
}

/// One editing session: the model, the note, and everything needed to draw them.
pub struct Studio {
    model: SlotAssignmentModel,
    note: String,
    canvas_width: f64,
    layouts: LayoutCache,
    assets: AssetCache,
    compositor: Compositor,
    generation: u64,
    last: Option<(SceneFingerprint, Arc<RasterSurface>)>,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("canvas_width", &self.canvas_width)
            .field("generation", &self.generation)
            .field("assets", &self.assets)
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Start a session loading images through `source`.
    ///
    /// Fails when the options are invalid (pixel ratio, font, or a width the template cannot
    /// lay out).
    pub fn new(source: Arc<dyn ImageSource>, opts: StudioOpts) -> RosterResult<Self> {
        let compositor = Compositor::new(opts.compositor)?;
        let mut layouts = LayoutCache::new(opts.layout);
        layouts.get_or_compute(opts.canvas_width)?;
        Ok(Self {
            model: SlotAssignmentModel::new(),
            note: String::new(),
            canvas_width: opts.canvas_width,
            layouts,
            assets: AssetCache::new(source, opts.assets),
            compositor,
            generation: 0,
            last: None,
        })
    }

    /// Current roster state.
    pub fn model(&self) -> &SlotAssignmentModel {
        &self.model
    }

    /// Current note text.
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Logical canvas width.
    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    /// Session image cache.
    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Incremented by every change to a drawn input.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Geometry for the current width.
    pub fn layout(&mut self) -> RosterResult<Arc<LayoutTree>> {
        self.layouts.get_or_compute(self.canvas_width)
    }

    /// Overlay target under a logical point.
    pub fn hit_test(&mut self, point: Point) -> RosterResult<Option<HitTarget>> {
        Ok(self.layout()?.hit_test(point))
    }

    /// Mutate the model. Outstanding batches become stale when the model actually changes.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut SlotAssignmentModel) -> R) -> R {
        let before = self.model.clone();
        let out = f(&mut self.model);
        if self.model != before {
            self.bump();
        }
        out
    }

    /// Replace the note text.
    pub fn set_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if note != self.note {
            self.note = note;
            self.bump();
        }
    }

    /// Change the canvas width; fails (leaving the width unchanged) if it cannot be laid out.
    pub fn set_canvas_width(&mut self, width: f64) -> RosterResult<()> {
        if width.to_bits() == self.canvas_width.to_bits() {
            return Ok(());
        }
        self.layouts.get_or_compute(width)?;
        self.canvas_width = width;
        self.bump();
        Ok(())
    }

    /// Change the device pixel ratio; fails (leaving it unchanged) when out of range.
    pub fn set_device_pixel_ratio(&mut self, ratio: f64) -> RosterResult<()> {
        if ratio == self.compositor.ratio().get() {
            return Ok(());
        }
        self.compositor.set_device_pixel_ratio(ratio)?;
        self.bump();
        Ok(())
    }

    /// Snapshot the working set of the current model and request every source in it.
    pub fn begin_batch(&mut self) -> LoadBatch {
        let sources: Vec<String> = self
            .model
            .required_sources()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let requests = sources
            .into_iter()
            .map(|src| {
                let req = self.assets.request(&src);
                (src, req)
            })
            .collect();
        LoadBatch {
            generation: self.generation,
            requests,
        }
    }

    /// Draw the card for a settled batch, or report it stale.
    pub fn finish(&mut self, settled: SettledBatch) -> RosterResult<FrameOutcome> {
        if settled.generation != self.generation {
            tracing::debug!(
                batch = settled.generation,
                current = self.generation,
                "discarding stale load batch"
            );
            return Ok(FrameOutcome::Stale);
        }
        self.assets.settle();
        Ok(FrameOutcome::Drawn(self.draw()?))
    }

    /// Run batches until one is drawn.
    pub async fn render(&mut self) -> RosterResult<Arc<RasterSurface>> {
        loop {
            let settled = self.begin_batch().settle().await;
            if let FrameOutcome::Drawn(surface) = self.finish(settled)? {
                return Ok(surface);
            }
        }
    }

    /// Render and encode the card as PNG.
    pub async fn export_png(&mut self) -> RosterResult<Vec<u8>> {
        self.render().await?.to_png()
    }

    /// Draw with whatever is resident now, reusing the last surface when nothing drawn changed.
    #[tracing::instrument(skip_all, fields(generation = self.generation))]
    pub fn draw(&mut self) -> RosterResult<Arc<RasterSurface>> {
        let layout = self.layouts.get_or_compute(self.canvas_width)?;
        let fingerprint = fingerprint_scene(
            self.canvas_width,
            self.compositor.ratio().get(),
            &self.model,
            &self.note,
            &self.assets,
        );
        if let Some((fp, surface)) = &self.last
            && *fp == fingerprint
        {
            return Ok(Arc::clone(surface));
        }

        let surface = Arc::new(
            self.compositor
                .render(&layout, &self.model, &self.assets, &self.note)?,
        );
        self.last = Some((fingerprint, Arc::clone(&surface)));
        Ok(surface)
    }

    fn bump(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/studio.rs"]
mod tests;
