//! Layout-aware template renderer.
//!
//! This module provides [`LayoutRenderer`], which renders a template file and
//! everything it pulls in: includes are rendered and spliced in place, then the
//! result is handed to the requested layout as `body`, and so on up the chain.
//!
//! # Render Steps
//!
//! For every file, depth first:
//!
//! 1. Read the file through the [`FileSource`] (or take it from the cache) and
//!    compile it with the [`TemplateEngine`].
//! 2. Execute it against global locals, then the call's locals, then `filename`.
//! 3. Render each include, in call order, relative to the *current* file, and
//!    splice the results into the output.
//! 4. If the template set `layout`, render the layout with the same locals plus
//!    `body` set to the expanded output. Otherwise the output is final.
//!
//! # Example
//!
//! ```rust
//! use standout_layout::{LayoutRenderer, Locals, RenderOptions};
//! use standout_layout::source::MemoryFiles;
//!
//! let files = MemoryFiles::new()
//!     .with_file("/views/page.jinja", r#"{% set layout = "base" %}Hi {{ name }}"#)
//!     .with_file("/views/base.jinja", "<main>{{ body }}</main>");
//!
//! let renderer = LayoutRenderer::builder().files(files).build();
//!
//! let mut locals = Locals::new();
//! locals.insert("name".into(), "Ann".into());
//!
//! let html = renderer
//!     .render("/views/page.jinja", &locals, &RenderOptions::default())
//!     .unwrap();
//! assert_eq!(html, "<main>Hi Ann</main>");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::cache::TemplateCache;
use crate::engine::{splice_includes, CompileOptions, CompiledTemplate, MiniJinjaEngine, TemplateEngine};
use crate::error::LayoutError;
use crate::locals::{merge, to_locals, GlobalLocals, Locals, BODY_KEY, FILENAME_KEY, LAYOUT_KEY};
use crate::options::{LayoutConfig, RenderOptions};
use crate::path::{absolute, PathResolver, TemplateReference};
use crate::source::{FileSource, OsFiles};

/// Settings that hold for one top-level render call.
struct CallSettings<'a> {
    views: Option<PathBuf>,
    cache: bool,
    compile: &'a Locals,
}

/// Renders template files with layouts and includes.
///
/// A renderer is immutable once built and can be shared across threads; the only
/// state it keeps between calls is the optional compiled-template cache.
///
/// # Example: SimpleEngine
///
/// ```rust
/// use standout_layout::{LayoutRenderer, Locals, RenderOptions};
/// use standout_layout::engine::SimpleEngine;
/// use standout_layout::source::MemoryFiles;
///
/// let files = MemoryFiles::new()
///     .with_file("/v/page.jinja", "{@layout base}{@include nav}{title}")
///     .with_file("/v/nav.jinja", "[nav]")
///     .with_file("/v/base.jinja", "<{body}>");
///
/// let renderer = LayoutRenderer::builder()
///     .engine(SimpleEngine::new())
///     .files(files)
///     .build();
///
/// let mut locals = Locals::new();
/// locals.insert("title".into(), "Home".into());
/// let out = renderer.render("/v/page.jinja", &locals, &RenderOptions::default()).unwrap();
/// assert_eq!(out, "<[nav]Home>");
/// ```
pub struct LayoutRenderer {
    engine: Box<dyn TemplateEngine>,
    files: Box<dyn FileSource>,
    resolver: PathResolver,
    globals: GlobalLocals,
    cache: TemplateCache,
    config: LayoutConfig,
}

impl LayoutRenderer {
    /// Creates a renderer with the MiniJinja engine, the local file system and
    /// the default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a renderer.
    pub fn builder() -> LayoutRendererBuilder {
        LayoutRendererBuilder::default()
    }

    /// The path resolver for this renderer's extension.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// The global locals merged into every render.
    pub fn globals(&self) -> &GlobalLocals {
        &self.globals
    }

    /// The compiled-template cache.
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Name of the template engine in use.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Renders a template file with its includes and layouts.
    ///
    /// `file_path` must carry the template extension; it is the file that is read,
    /// made absolute against the current directory. When `options.filename` is set
    /// (it must carry the extension too), the template is rendered as if it lived
    /// there: relative layout and include references resolve against it and it is
    /// the `filename` local.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidFilePath`] / [`LayoutError::FilePathIsNotTemplate`] when
    ///   `file_path` or `options.filename` is rejected
    /// - [`LayoutError::Io`] when a file cannot be read, unchanged from the source
    /// - [`LayoutError::Template`] when the engine fails, unchanged from the engine
    /// - [`LayoutError::IncludeAltered`] when the result of an include was changed
    ///   before it reached the output
    /// - [`LayoutError::LayoutCycleOrTooDeep`] when nesting exceeds `max_depth`
    pub fn render(
        &self,
        file_path: &str,
        locals: &Locals,
        options: &RenderOptions,
    ) -> Result<String, LayoutError> {
        self.resolver.validate_file_path(file_path)?;
        let path = absolute(Path::new(file_path))?;
        let anchor = match &options.filename {
            Some(filename) => {
                self.resolver.validate_file_path(&filename.to_string_lossy())?;
                absolute(filename)?
            }
            None => path.clone(),
        };

        let call = CallSettings {
            views: options.views_or(&self.config).map(absolute).transpose()?,
            cache: options.cache_or(&self.config),
            compile: &options.compile,
        };

        tracing::debug!(
            path = %path.display(),
            filename = %anchor.display(),
            engine = self.engine.name(),
            cache = call.cache,
            "rendering template"
        );
        let output = self.render_file(&path, &anchor, locals, &call, 0)?;
        tracing::debug!(path = %path.display(), bytes = output.len(), "rendered template");

        Ok(output)
    }

    /// Renders a template file with any serializable data as locals.
    ///
    /// The data must serialize to a map.
    pub fn render_with<T: Serialize + ?Sized>(
        &self,
        file_path: &str,
        data: &T,
        options: &RenderOptions,
    ) -> Result<String, LayoutError> {
        let locals = to_locals(data)?;
        self.render(file_path, &locals, options)
    }

    /// Resolves a layout or include reference made by `current`.
    ///
    /// Bare names are looked up next to `current` first. When that file does not
    /// exist and `current` lives under `views`, each ancestor directory up to and
    /// including `views` is tried in turn. If nothing is found the sibling path is
    /// returned, so that reading it reports the file system's own error.
    pub fn locate(
        &self,
        current: &Path,
        reference: &str,
        views: Option<&Path>,
    ) -> Result<PathBuf, LayoutError> {
        let reference = TemplateReference::parse(reference)?;
        self.locate_reference(current, &reference, views)
    }

    fn locate_reference(
        &self,
        current: &Path,
        reference: &TemplateReference,
        views: Option<&Path>,
    ) -> Result<PathBuf, LayoutError> {
        let name = match reference {
            TemplateReference::Path(path) => return self.resolver.resolve_relative(current, path),
            TemplateReference::Name(name) => name,
            TemplateReference::NoLayout => {
                return Err(LayoutError::invalid_path("no template reference"))
            }
        };

        let sibling = self.resolver.resolve_relative(current, name)?;
        if self.files.exists(&sibling) {
            return Ok(sibling);
        }

        let Some(root) = views else {
            return Ok(sibling);
        };
        let in_views = current.parent().is_some_and(|dir| dir.starts_with(root));
        if !in_views {
            return Ok(sibling);
        }

        let file_name = self.resolver.with_extension(name);
        for dir in current.ancestors().skip(2) {
            if !dir.starts_with(root) {
                break;
            }
            let candidate = dir.join(&file_name);
            if self.files.exists(&candidate) {
                tracing::trace!(
                    reference = %name,
                    found = %candidate.display(),
                    "resolved template in ancestor directory"
                );
                return Ok(candidate);
            }
        }

        Ok(sibling)
    }

    /// Renders the file at `path` as if it lived at `anchor`. The two differ only
    /// for the top-level file when a caller sets `filename`.
    fn render_file(
        &self,
        path: &Path,
        anchor: &Path,
        locals: &Locals,
        call: &CallSettings<'_>,
        depth: usize,
    ) -> Result<String, LayoutError> {
        if let Some(max_depth) = self.config.max_depth {
            if depth > max_depth {
                tracing::warn!(
                    path = %path.display(),
                    max_depth,
                    "layout chain too deep, probably a cycle"
                );
                return Err(LayoutError::LayoutCycleOrTooDeep {
                    path: path.to_path_buf(),
                    max_depth,
                });
            }
        }
        tracing::trace!(path = %path.display(), depth, "rendering file");

        let template = self.compiled(path, call)?;
        let execution = template.execute(&self.context(anchor, locals))?;

        let mut rendered = Vec::with_capacity(execution.includes.len());
        for request in &execution.includes {
            let include_path = self.locate(anchor, &request.reference, call.views.as_deref())?;
            tracing::trace!(
                from = %anchor.display(),
                include = %include_path.display(),
                "rendering include"
            );
            let include_locals = merge(locals, &request.locals);
            rendered.push(self.render_file(
                &include_path,
                &include_path,
                &include_locals,
                call,
                depth + 1,
            )?);
        }
        let body = splice_includes(&execution.output, execution.marker_key, &rendered)
            .map_err(|err| {
                tracing::warn!(path = %path.display(), "include output was altered by the template");
                err
            })?;

        let reference = TemplateReference::from_layout_value(&execution.layout)?;
        if reference == TemplateReference::NoLayout {
            return Ok(body);
        }

        let parent = self.locate_reference(anchor, &reference, call.views.as_deref())?;
        tracing::trace!(
            child = %anchor.display(),
            layout = %parent.display(),
            "rendering layout"
        );
        let mut parent_locals = locals.clone();
        parent_locals.insert(BODY_KEY.to_string(), Value::String(body));
        self.render_file(&parent, &parent, &parent_locals, call, depth + 1)
    }

    /// Returns the compiled template for `path`, reading and compiling on a miss.
    fn compiled(
        &self,
        path: &Path,
        call: &CallSettings<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, LayoutError> {
        if call.cache {
            if let Some(template) = self.cache.get(path) {
                tracing::trace!(path = %path.display(), "template cache hit");
                return Ok(template);
            }
            tracing::trace!(path = %path.display(), "template cache miss");
        }

        let source = self.files.read_to_string(path)?;
        let options = CompileOptions {
            filename: path.to_path_buf(),
            extra: call.compile.clone(),
        };
        let template = self.engine.compile(&source, &options)?;

        if call.cache {
            self.cache.insert(path.to_path_buf(), Arc::clone(&template));
        }
        Ok(template)
    }

    /// Builds the execution context: globals, then locals, then `filename`.
    /// A `layout` from either layer is dropped.
    fn context(&self, path: &Path, locals: &Locals) -> Locals {
        let mut context = merge(self.globals.as_locals(), locals);
        context.remove(LAYOUT_KEY);
        context.insert(
            FILENAME_KEY.to_string(),
            Value::String(path.display().to_string()),
        );
        context
    }
}

impl Default for LayoutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LayoutRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRenderer")
            .field("engine", &self.engine.name())
            .field("resolver", &self.resolver)
            .field("globals", &self.globals)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`LayoutRenderer`].
#[derive(Default)]
pub struct LayoutRendererBuilder {
    engine: Option<Box<dyn TemplateEngine>>,
    files: Option<Box<dyn FileSource>>,
    globals: GlobalLocals,
    config: LayoutConfig,
}

impl LayoutRendererBuilder {
    /// Sets the template engine. Defaults to [`MiniJinjaEngine`].
    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Sets the template source. Defaults to [`OsFiles`].
    pub fn files(mut self, files: impl FileSource + 'static) -> Self {
        self.files = Some(Box::new(files));
        self
    }

    /// Sets the global locals.
    pub fn globals(mut self, globals: GlobalLocals) -> Self {
        self.globals = globals;
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> LayoutRenderer {
        let resolver = PathResolver::new(self.config.extension.clone());
        let config = LayoutConfig {
            extension: resolver.extension().to_string(),
            ..self.config
        };
        LayoutRenderer {
            engine: self
                .engine
                .unwrap_or_else(|| Box::new(MiniJinjaEngine::new())),
            files: self.files.unwrap_or_else(|| Box::new(OsFiles)),
            resolver,
            globals: self.globals,
            cache: TemplateCache::new(),
            config,
        }
    }
}
