use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use futures_util::future::{BoxFuture, FutureExt};

use crate::foundation::error::{RosterError, RosterResult};

/// Where image bytes come from.
///
/// `fetch` returns an owned future so the cache can share a single in-flight load between every
/// caller asking for the same source.
pub trait ImageSource: Send + Sync {
    /// Fetch the encoded bytes for `src`.
    fn fetch(&self, src: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>>;
}

/// Reads sources as paths relative to a root directory.
///
/// A leading `/` is taken as root-relative, matching catalog sources written as site paths.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory used when resolving sources.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for DirSource {
    fn fetch(&self, src: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let path = normalize_rel_path(src.trim_start_matches('/')).map(|p| self.root.join(p));
        async move {
            let path = path?;
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("read image bytes from '{}'", path.display()))
        }
        .boxed()
    }
}

/// In-memory sources, keyed by exact source string.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    images: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register encoded bytes for `src`.
    pub fn insert(&mut self, src: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.images.insert(src.into(), bytes.into());
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with(mut self, src: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(src, bytes);
        self
    }
}

impl ImageSource for MemorySource {
    fn fetch(&self, src: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let found = self.images.get(src).cloned();
        let src = src.to_owned();
        async move {
            found
                .map(|b| b.to_vec())
                .ok_or_else(|| anyhow::anyhow!("no image registered for '{src}'"))
        }
        .boxed()
    }
}

/// Normalize and validate a relative source path.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> RosterResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(RosterError::validation("image paths must be relative"));
    }
    if s.is_empty() {
        return Err(RosterError::validation("image path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(RosterError::validation("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(RosterError::validation("image path must contain a file name"));
    }

    Ok(out.join("/"))
}
