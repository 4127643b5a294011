//! Session-scoped image cache.
//!
//! Every distinct source is loaded at most once. Concurrent requests for a source that is still
//! loading share the same in-flight future; a finished load is memoized for the rest of the
//! session. Failures are memoized too: the source never becomes ready and is not retried, which
//! the compositor answers with placeholder rendering.
//!
//! The cache is single-writer. `request` takes `&mut self`; readiness queries take `&self` and
//! observe completed loads without waiting on them.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt, Shared};

use crate::assets::decode::{AssetCacheOpts, DecodedImage, decode_for_src};
use crate::assets::source::ImageSource;

/// Shared handle to a decoded image.
pub type ImageHandle = Arc<DecodedImage>;

/// Outcome of one image load.
pub type LoadResult = Result<ImageHandle, LoadFailure>;

/// Awaitable load shared by every requester of the same source.
pub type ImageRequest = Shared<BoxFuture<'static, LoadResult>>;

/// Why a source could not be loaded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to load image '{src}': {message}")]
pub struct LoadFailure {
    /// Source that failed.
    pub src: String,
    /// Rendered error chain.
    pub message: String,
}

/// Where a source is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// Never requested.
    Absent,
    /// Requested and not finished.
    Loading,
    /// Decoded and resident.
    Ready,
    /// Failed; stays failed for the session.
    Failed,
}

enum Entry {
    Loading(ImageRequest),
    Ready(ImageHandle),
    Failed(LoadFailure),
}

impl Entry {
    fn status(&self) -> LoadStatus {
        match self {
            Entry::Ready(_) => LoadStatus::Ready,
            Entry::Failed(_) => LoadStatus::Failed,
            Entry::Loading(req) => match req.peek() {
                None => LoadStatus::Loading,
                Some(Ok(_)) => LoadStatus::Ready,
                Some(Err(_)) => LoadStatus::Failed,
            },
        }
    }

    fn handle(&self) -> Option<&ImageHandle> {
        match self {
            Entry::Ready(h) => Some(h),
            Entry::Loading(req) => req.peek().and_then(|r| r.as_ref().ok()),
            Entry::Failed(_) => None,
        }
    }

    /// Replace a finished in-flight load with its outcome.
    fn promote(&mut self) {
        let next = match self {
            Entry::Loading(req) => match req.peek() {
                Some(Ok(h)) => Entry::Ready(Arc::clone(h)),
                Some(Err(e)) => Entry::Failed(e.clone()),
                None => return,
            },
            _ => return,
        };
        *self = next;
    }
}

/// Memoizing, request-coalescing image cache.
pub struct AssetCache {
    source: Arc<dyn ImageSource>,
    opts: AssetCacheOpts,
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("opts", &self.opts)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl AssetCache {
    /// Cache loading through `source`.
    pub fn new(source: Arc<dyn ImageSource>, opts: AssetCacheOpts) -> Self {
        Self {
            source,
            opts,
            entries: HashMap::new(),
        }
    }

    /// Start (or join) the load of `src`.
    ///
    /// Returns the in-flight request when one exists, an already-resolved request when the
    /// outcome is known, and otherwise starts a new load. The returned future does the work when
    /// polled; dropping it does not cancel loads other callers are waiting on.
    pub fn request(&mut self, src: &str) -> ImageRequest {
        if let Some(entry) = self.entries.get_mut(src) {
            entry.promote();
            return match entry {
                Entry::Loading(req) => req.clone(),
                Entry::Ready(h) => future::ready(Ok(Arc::clone(h))).boxed().shared(),
                Entry::Failed(e) => future::ready(Err(e.clone())).boxed().shared(),
            };
        }

        let req = load(Arc::clone(&self.source), src.to_owned(), self.opts.clone())
            .boxed()
            .shared();
        self.entries
            .insert(src.to_owned(), Entry::Loading(req.clone()));
        req
    }

    /// Whether a decoded image for `src` is resident.
    pub fn is_ready(&self, src: &str) -> bool {
        self.status(src) == LoadStatus::Ready
    }

    /// Decoded image for `src`, when resident.
    pub fn get(&self, src: &str) -> Option<ImageHandle> {
        self.entries.get(src).and_then(Entry::handle).cloned()
    }

    /// Lifecycle state of `src`.
    pub fn status(&self, src: &str) -> LoadStatus {
        self.entries
            .get(src)
            .map_or(LoadStatus::Absent, Entry::status)
    }

    /// Recorded failure for `src`, if its load failed.
    pub fn failure(&self, src: &str) -> Option<LoadFailure> {
        match self.entries.get(src)? {
            Entry::Failed(e) => Some(e.clone()),
            Entry::Loading(req) => req.peek().and_then(|r| r.as_ref().err()).cloned(),
            Entry::Ready(_) => None,
        }
    }

    /// Fold finished loads into their final entries, releasing the shared futures.
    pub fn settle(&mut self) {
        for entry in self.entries.values_mut() {
            entry.promote();
        }
    }

    /// Number of sources ever requested.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was requested yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pixel bytes held by resident images.
    pub fn resident_bytes(&self) -> usize {
        self.entries
            .values()
            .filter_map(Entry::handle)
            .map(|h| h.byte_len())
            .sum()
    }
}

async fn load(source: Arc<dyn ImageSource>, src: String, opts: AssetCacheOpts) -> LoadResult {
    let decoded = match source.fetch(&src).await {
        Ok(bytes) => decode_for_src(&src, &bytes, &opts).map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };
    match decoded {
        Ok(img) => {
            tracing::debug!(src = %src, width = img.width, height = img.height, "image loaded");
            Ok(Arc::new(img))
        }
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!(src = %src, error = %message, "image load failed");
            Err(LoadFailure { src, message })
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
