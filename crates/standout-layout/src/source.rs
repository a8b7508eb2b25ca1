//! Template sources.
//!
//! The renderer never touches the file system directly; it reads template
//! content through a [`FileSource`]. Two sources are provided:
//!
//! - [`OsFiles`]: reads from disk on every call (the default).
//! - [`MemoryFiles`]: an in-memory map, for tests and for deployments that embed
//!   their templates into the binary.
//!
//! Errors are returned exactly as the source produced them. A missing file is an
//! [`io::ErrorKind::NotFound`] error in both sources, so callers can branch on the
//! kind regardless of where templates live.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Read access to template files.
pub trait FileSource: Send + Sync {
    /// Reads the whole file at `path`.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether a file exists at `path`. Used for ancestor lookup only.
    fn exists(&self, path: &Path) -> bool;
}

/// Reads templates from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFiles;

impl FileSource for OsFiles {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory template files keyed by path.
///
/// # Example
///
/// ```rust
/// use standout_layout::source::{FileSource, MemoryFiles};
/// use std::path::Path;
///
/// let files = MemoryFiles::new().with_file("/views/home.jinja", "Hello");
/// assert_eq!(files.read_to_string(Path::new("/views/home.jinja")).unwrap(), "Hello");
///
/// let missing = files.read_to_string(Path::new("/views/nope.jinja")).unwrap_err();
/// assert_eq!(missing.kind(), std::io::ErrorKind::NotFound);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl MemoryFiles {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    /// Removes a file, returning its content.
    pub fn remove(&self, path: &Path) -> Option<String> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }

    /// Number of files held.
    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no files are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileSource for MemoryFiles {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such file: {}", path.display()),
                )
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

impl<S: FileSource + ?Sized> FileSource for std::sync::Arc<S> {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}
