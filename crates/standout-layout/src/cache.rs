//! Compiled-template cache.
//!
//! A [`TemplateCache`] maps absolute template paths to compiled templates. It is
//! owned by one [`LayoutRenderer`](crate::LayoutRenderer) and lives as long as it
//! does. Entries are created on first compile and never invalidated: a renderer
//! that must pick up edited files should run with caching disabled, or be
//! rebuilt.
//!
//! Writes are idempotent. Two threads compiling the same path at once both
//! insert, and the later entry replaces an equivalent earlier one.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::engine::CompiledTemplate;

/// Compiled templates keyed by absolute path.
#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<PathBuf, Arc<dyn CompiledTemplate>>>,
}

impl TemplateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled template for `path`, if cached.
    pub fn get(&self, path: &Path) -> Option<Arc<dyn CompiledTemplate>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Stores a compiled template, replacing any previous entry.
    pub fn insert(&self, path: PathBuf, template: Arc<dyn CompiledTemplate>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, template);
    }

    /// Whether `path` has a cached entry.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<_> = entries.keys().collect();
        paths.sort();
        f.debug_struct("TemplateCache")
            .field("paths", &paths)
            .finish()
    }
}
