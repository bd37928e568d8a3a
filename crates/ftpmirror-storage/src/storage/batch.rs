//! Write and delete queues.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A local file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Style name → local file. One entry per style; queueing a style again
/// replaces the earlier file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    files: BTreeMap<String, LocalFile>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `file` for `style`, returning the file it replaces.
    pub fn insert(&mut self, style: impl Into<String>, file: LocalFile) -> Option<LocalFile> {
        self.files.insert(style.into(), file)
    }

    pub fn get(&self, style: &str) -> Option<&LocalFile> {
        self.files.get(style)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LocalFile)> {
        self.files.iter().map(|(style, file)| (style.as_str(), file))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Remote paths to delete, in queue order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteBatch {
    paths: Vec<String>,
}

impl DeleteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>) {
        self.paths.push(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

impl<S: Into<String>> Extend<S> for DeleteBatch {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.paths.extend(iter.into_iter().map(Into::into));
    }
}
