use std::sync::Arc;

use crate::foundation::error::RosterResult;
use crate::layout::engine::{LayoutConfig, LayoutTree, compute_layout};

/// Memoized [`compute_layout`]: recomputes only when the width or the template changes.
#[derive(Debug, Default)]
pub struct LayoutCache {
    config: LayoutConfig,
    /// `(width bits, tree)` of the last successful computation.
    last: Option<(u64, Arc<LayoutTree>)>,
}

impl LayoutCache {
    /// Empty cache for `config`.
    pub fn new(config: LayoutConfig) -> Self {
        Self { config, last: None }
    }

    /// Template constants in use.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Swap the template; the next lookup recomputes.
    pub fn set_config(&mut self, config: LayoutConfig) {
        if config != self.config {
            self.config = config;
            self.last = None;
        }
    }

    /// Geometry for `canvas_width`, shared with every consumer of the same width.
    pub fn get_or_compute(&mut self, canvas_width: f64) -> RosterResult<Arc<LayoutTree>> {
        let bits = canvas_width.to_bits();
        if let Some((w, tree)) = &self.last
            && *w == bits
        {
            return Ok(Arc::clone(tree));
        }
        let tree = Arc::new(compute_layout(canvas_width, &self.config)?);
        self.last = Some((bits, Arc::clone(&tree)));
        Ok(tree)
    }
}
