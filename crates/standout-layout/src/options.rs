//! Renderer configuration and per-call render options.
//!
//! Configuration lives at two levels:
//!
//! - [`LayoutConfig`]: fixed when a [`LayoutRenderer`](crate::LayoutRenderer) is built
//!   (template extension, views root, default cache flag, depth guard).
//! - [`RenderOptions`]: supplied with each render call and discarded afterwards. Its
//!   `views` and `cache` fields override the instance defaults for that call only.
//!
//! `LayoutConfig` can be loaded from YAML:
//!
//! ```rust
//! use standout_layout::LayoutConfig;
//!
//! let config = LayoutConfig::from_yaml(r#"
//! extension: .ejs
//! views: /srv/app/views
//! cache: true
//! "#).unwrap();
//!
//! assert_eq!(config.extension, ".ejs");
//! assert!(config.cache);
//! assert_eq!(config.max_depth, Some(64));
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::LayoutError;
use crate::locals::{Locals, FILENAME_KEY};
use crate::path::DEFAULT_EXTENSION;

/// Default limit on layout and include nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Host option keys that configure rendering rather than feed the template.
const HOST_SETTINGS_KEY: &str = "settings";
const HOST_CACHE_KEY: &str = "cache";
const HOST_VIEWS_KEY: &str = "views";
const HOST_LOCALS_KEY: &str = "_locals";

/// Per-renderer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Extension every template file carries, including the dot.
    pub extension: String,
    /// Root directory of the views, used for view-name lookup and as the upper
    /// bound of ancestor lookup.
    pub views: Option<PathBuf>,
    /// Whether compiled templates are cached by absolute path.
    pub cache: bool,
    /// Maximum layout/include nesting; `None` disables the guard.
    pub max_depth: Option<usize>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            views: None,
            cache: false,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl LayoutConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, LayoutError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Sets the template extension.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the views root.
    pub fn views(mut self, views: impl Into<PathBuf>) -> Self {
        self.views = Some(views.into());
        self
    }

    /// Enables or disables the compiled-template cache.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Sets the nesting limit; `None` removes it.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Options for a single render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    /// Path of the file being rendered. Defaults to the path passed to `render`.
    pub filename: Option<PathBuf>,
    /// Views root for this call, overriding [`LayoutConfig::views`].
    pub views: Option<PathBuf>,
    /// Cache flag for this call, overriding [`LayoutConfig::cache`].
    pub cache: Option<bool>,
    /// Engine-specific compile options.
    pub compile: Locals,
}

impl RenderOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file name.
    pub fn filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the views root.
    pub fn views(mut self, views: impl Into<PathBuf>) -> Self {
        self.views = Some(views.into());
        self
    }

    /// Sets the cache flag.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Adds an engine-specific compile option.
    pub fn compile_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compile.insert(key.into(), value.into());
        self
    }

    /// Reads render options out of a host's option bag.
    ///
    /// Recognizes `filename`, `views` (or `settings.views`) and `cache`.
    /// Values of the wrong type are ignored here; `filename` is validated by the
    /// caller so that a bad value surfaces as
    /// [`InvalidFilePath`](LayoutError::InvalidFilePath).
    pub fn from_host_options(options: &Locals) -> Self {
        let views = options
            .get(HOST_VIEWS_KEY)
            .or_else(|| {
                options
                    .get(HOST_SETTINGS_KEY)
                    .and_then(|settings| settings.get(HOST_VIEWS_KEY))
            })
            .and_then(Value::as_str)
            .map(PathBuf::from);

        Self {
            filename: options
                .get(FILENAME_KEY)
                .and_then(Value::as_str)
                .map(PathBuf::from),
            views,
            cache: options.get(HOST_CACHE_KEY).and_then(Value::as_bool),
            compile: Locals::new(),
        }
    }

    /// The effective views root given the renderer's configuration.
    pub fn views_or<'a>(&'a self, config: &'a LayoutConfig) -> Option<&'a Path> {
        self.views.as_deref().or(config.views.as_deref())
    }

    /// The effective cache flag given the renderer's configuration.
    pub fn cache_or(&self, config: &LayoutConfig) -> bool {
        self.cache.unwrap_or(config.cache)
    }
}

/// Extracts template locals from a host's option bag.
///
/// The host's bookkeeping keys (`settings`, `cache`, `views`, `_locals` and
/// `filename`) are removed. Entries of `_locals` are merged underneath the
/// remaining keys, so a value passed with the render call wins over one set on
/// the response.
pub fn host_locals(options: &Locals) -> Locals {
    let mut locals = match options.get(HOST_LOCALS_KEY) {
        Some(Value::Object(response_locals)) => response_locals.clone(),
        _ => Locals::new(),
    };
    for (key, value) in options {
        match key.as_str() {
            HOST_SETTINGS_KEY | HOST_CACHE_KEY | HOST_VIEWS_KEY | HOST_LOCALS_KEY
            | FILENAME_KEY => {}
            _ => {
                locals.insert(key.clone(), value.clone());
            }
        }
    }
    locals
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Locals {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = LayoutConfig::default();
        assert_eq!(config.extension, ".jinja");
        assert_eq!(config.views, None);
        assert!(!config.cache);
        assert_eq!(config.max_depth, Some(DEFAULT_MAX_DEPTH));
    }

    #[test]
    fn test_config_builder() {
        let config = LayoutConfig::new()
            .extension(".ejs")
            .views("/views")
            .cache(true)
            .max_depth(None);
        assert_eq!(config.extension, ".ejs");
        assert_eq!(config.views, Some(PathBuf::from("/views")));
        assert!(config.cache);
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn test_config_from_yaml_partial() {
        let config = LayoutConfig::from_yaml("max_depth: 8").unwrap();
        assert_eq!(config.max_depth, Some(8));
        assert_eq!(config.extension, ".jinja");
    }

    #[test]
    fn test_config_from_yaml_invalid() {
        let err = LayoutConfig::from_yaml("cache: [not, a, bool]").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_options_from_host() {
        let options = RenderOptions::from_host_options(&bag(json!({
            "filename": "/views/a.jinja",
            "settings": {"views": "/views"},
            "cache": true,
            "title": "x"
        })));
        assert_eq!(options.filename, Some(PathBuf::from("/views/a.jinja")));
        assert_eq!(options.views, Some(PathBuf::from("/views")));
        assert_eq!(options.cache, Some(true));
    }

    #[test]
    fn test_options_override_config() {
        let config = LayoutConfig::new().views("/a").cache(true);
        let options = RenderOptions::new().views("/b").cache(false);
        assert_eq!(options.views_or(&config), Some(Path::new("/b")));
        assert!(!options.cache_or(&config));

        let inherit = RenderOptions::new();
        assert_eq!(inherit.views_or(&config), Some(Path::new("/a")));
        assert!(inherit.cache_or(&config));
    }

    #[test]
    fn test_host_locals_strips_bookkeeping() {
        let locals = host_locals(&bag(json!({
            "settings": {"views": "/views"},
            "cache": false,
            "views": "/other-views",
            "filename": "/views/a.jinja",
            "_locals": {"user": "ann", "title": "from response"},
            "title": "from call"
        })));
        assert_eq!(
            Value::Object(locals),
            json!({"user": "ann", "title": "from call"})
        );
    }
}
