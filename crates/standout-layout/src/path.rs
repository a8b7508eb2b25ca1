//! Template path validation and resolution.
//!
//! Every file the renderer touches goes through [`PathResolver`]: the top-level
//! path is validated, and every layout or include reference is resolved against
//! the file that made it. Resolution is purely lexical; whether the file exists is
//! the [`FileSource`](crate::source::FileSource)'s concern.
//!
//! # Reference Forms
//!
//! | Reference | Kind | Resolves to |
//! |-----------|------|-------------|
//! | `"base"` | [`TemplateReference::Name`] | `<dir of current file>/base.jinja` (with ancestor lookup) |
//! | `"partials/nav"` | [`TemplateReference::Path`] | `<dir of current file>/partials/nav.jinja` |
//! | `"../shared/nav.jinja"` | [`TemplateReference::Path`] | `<parent of dir>/shared/nav.jinja` |
//! | `"/srv/views/base"` | [`TemplateReference::Path`] | `/srv/views/base.jinja` |
//! | `null`, `false`, `""` | [`TemplateReference::NoLayout`] | nothing (layouts only) |
//!
//! The extension is appended when missing, so templates can refer to each other
//! by logical name without repeating it.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::error::{json_type, LayoutError};

/// Template extension used when none is configured.
///
/// Matches the highest-priority template extension of the standout template
/// registry.
pub const DEFAULT_EXTENSION: &str = ".jinja";

/// A parsed reference to another template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateReference {
    /// An explicit relative or absolute path (contains a separator or starts with `.`).
    Path(String),

    /// A bare logical name, eligible for ancestor lookup.
    Name(String),

    /// No template: the layout value was unset or falsy.
    NoLayout,
}

impl TemplateReference {
    /// Parses a reference string.
    ///
    /// Fails with [`LayoutError::InvalidFilePath`] for an empty reference.
    pub fn parse(reference: &str) -> Result<Self, LayoutError> {
        if reference.is_empty() {
            return Err(LayoutError::invalid_path("template reference is empty"));
        }
        let explicit = reference.starts_with('.')
            || reference.contains('/')
            || reference.contains('\\')
            || Path::new(reference).is_absolute();
        if explicit {
            Ok(TemplateReference::Path(reference.to_string()))
        } else {
            Ok(TemplateReference::Name(reference.to_string()))
        }
    }

    /// Interprets the value a template left in its `layout` variable.
    ///
    /// `null`, `false` and the empty string mean "no layout". Any other
    /// non-string value fails with [`LayoutError::InvalidFilePath`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use standout_layout::TemplateReference;
    /// use serde_json::json;
    ///
    /// assert_eq!(
    ///     TemplateReference::from_layout_value(&json!(false)).unwrap(),
    ///     TemplateReference::NoLayout
    /// );
    /// assert_eq!(
    ///     TemplateReference::from_layout_value(&json!("base")).unwrap(),
    ///     TemplateReference::Name("base".into())
    /// );
    /// ```
    pub fn from_layout_value(value: &Value) -> Result<Self, LayoutError> {
        match value {
            Value::Null | Value::Bool(false) => Ok(TemplateReference::NoLayout),
            Value::String(s) if s.is_empty() => Ok(TemplateReference::NoLayout),
            Value::String(s) => Self::parse(s),
            other => Err(LayoutError::invalid_path(format!(
                "layout must be a path string, got {}",
                json_type(other)
            ))),
        }
    }

    /// Returns the reference text, or `None` for [`NoLayout`](Self::NoLayout).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateReference::Path(s) | TemplateReference::Name(s) => Some(s),
            TemplateReference::NoLayout => None,
        }
    }

    /// Whether this is a bare name.
    pub fn is_name(&self) -> bool {
        matches!(self, TemplateReference::Name(_))
    }
}

/// Validates and resolves template paths for one template extension.
///
/// # Example
///
/// ```rust
/// use standout_layout::PathResolver;
/// use std::path::{Path, PathBuf};
///
/// let resolver = PathResolver::default();
/// assert!(resolver.validate_file_path("/views/home.jinja").is_ok());
///
/// let nav = resolver
///     .resolve_relative(Path::new("/views/pages/home.jinja"), "../partials/nav")
///     .unwrap();
/// assert_eq!(nav, PathBuf::from("/views/partials/nav.jinja"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    extension: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl PathResolver {
    /// Creates a resolver for the given extension.
    ///
    /// A leading dot is added when missing (`"ejs"` becomes `".ejs"`). An empty
    /// extension falls back to [`DEFAULT_EXTENSION`].
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = if extension.is_empty() {
            DEFAULT_EXTENSION.to_string()
        } else if extension.starts_with('.') {
            extension
        } else {
            format!(".{}", extension)
        };
        Self { extension }
    }

    /// The extension templates must carry, including the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `path` names a template file.
    pub fn is_template(&self, path: &str) -> bool {
        path.len() > self.extension.len() && path.ends_with(&self.extension)
    }

    /// Validates a template path.
    ///
    /// Returns the path unchanged when valid. Fails with
    /// [`LayoutError::InvalidFilePath`] when empty and with
    /// [`LayoutError::FilePathIsNotTemplate`] when the extension is wrong.
    pub fn validate_file_path<'a>(&self, path: &'a str) -> Result<&'a str, LayoutError> {
        if path.is_empty() {
            return Err(LayoutError::invalid_path("file path is empty"));
        }
        if !self.is_template(path) {
            return Err(LayoutError::FilePathIsNotTemplate {
                path: PathBuf::from(path),
                extension: self.extension.clone(),
            });
        }
        Ok(path)
    }

    /// Validates a loosely typed path, as found in a host's option bag.
    ///
    /// A missing value or a non-string fails with [`LayoutError::InvalidFilePath`].
    pub fn validate_value(&self, value: Option<&Value>) -> Result<PathBuf, LayoutError> {
        match value {
            None => Err(LayoutError::invalid_path("file path is missing")),
            Some(Value::String(s)) => self.validate_file_path(s).map(PathBuf::from),
            Some(other) => Err(LayoutError::invalid_path(format!(
                "file path must be a string, got {}",
                json_type(other)
            ))),
        }
    }

    /// Appends the extension unless the reference already carries it.
    pub fn with_extension(&self, reference: &str) -> String {
        if reference.ends_with(&self.extension) {
            reference.to_string()
        } else {
            format!("{}{}", reference, self.extension)
        }
    }

    /// Resolves `reference` against the directory containing `base`.
    ///
    /// Absolute references are kept as they are (apart from the extension).
    /// The result is always absolute, a relative `base` being taken from the
    /// current directory, and lexically normalized: `.` segments are dropped and
    /// `..` segments consume their parent.
    pub fn resolve_relative(&self, base: &Path, reference: &str) -> Result<PathBuf, LayoutError> {
        if reference.is_empty() {
            return Err(LayoutError::invalid_path("template reference is empty"));
        }
        let reference = self.with_extension(reference);
        let reference = Path::new(&reference);
        if reference.is_absolute() {
            return Ok(normalize(reference));
        }
        let dir = base.parent().unwrap_or_else(|| Path::new(""));
        absolute(&dir.join(reference))
    }

    /// Resolves a view name the way a host resolves `render("name")`: relative
    /// names are looked up under the views root.
    pub fn resolve_view(&self, views: Option<&Path>, name: &str) -> Result<PathBuf, LayoutError> {
        if name.is_empty() {
            return Err(LayoutError::invalid_path("view name is empty"));
        }
        let name = self.with_extension(name);
        let name = Path::new(&name);
        match views {
            Some(root) if !name.is_absolute() => absolute(&root.join(name)),
            _ => absolute(name),
        }
    }
}

/// Makes `path` absolute against the current directory and normalizes it.
///
/// Fails with [`LayoutError::InvalidFilePath`] for an empty path and with
/// [`LayoutError::Io`] when the current directory cannot be read.
pub fn absolute(path: &Path) -> Result<PathBuf, LayoutError> {
    if path.as_os_str().is_empty() {
        return Err(LayoutError::invalid_path("file path is empty"));
    }
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    Ok(normalize(&std::path::absolute(path)?))
}

/// Lexically normalizes a path without touching the file system.
///
/// `..` at the start of a relative path is kept; `..` directly under the root
/// is dropped.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
