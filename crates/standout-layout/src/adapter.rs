//! View-engine adapter for host frameworks.
//!
//! Web frameworks that render views by file extension usually expect a function
//! of the shape `(file_path, options, callback)`. [`create_engine_adapter`]
//! builds such a function around a [`LayoutRenderer`]:
//!
//! ```rust
//! use standout_layout::{create_engine_adapter, EngineArg, Locals};
//! use serde_json::json;
//!
//! // Global locals only
//! let engine = create_engine_adapter(json!({"site": "Docs"}), EngineArg::Absent).unwrap();
//! assert_eq!(engine.renderer().globals().get("site"), Some(&json!("Docs")));
//!
//! // A string is not a valid set of global locals
//! let err = create_engine_adapter(json!("oops"), EngineArg::Absent).unwrap_err();
//! assert_eq!(err.code(), "INVALID_GLOBAL_LOCALS");
//! ```
//!
//! Arguments are validated when the adapter is created, so a misconfigured
//! engine fails at startup rather than on the first request. Render failures are
//! delivered to the callback, never raised.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{json_type, LayoutError};
use crate::locals::{GlobalLocals, Locals, FILENAME_KEY};
use crate::options::{host_locals, RenderOptions};
use crate::renderer::{LayoutRenderer, LayoutRendererBuilder};

type TransformFn = dyn Fn(&Locals, &LayoutRenderer) -> Option<Locals> + Send + Sync;

/// Callback receiving the outcome of one adapter call.
pub type RenderCallback = Box<dyn FnOnce(Result<String, LayoutError>) + Send>;

/// A view-engine function, ready to be registered with a host.
pub type EngineFn = Arc<dyn Fn(&str, &Locals, RenderCallback) + Send + Sync>;

/// Rewrites locals once per top-level render, before compilation.
///
/// Returning `None` keeps the original locals.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Locals, &LayoutRenderer) -> Option<Locals> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Applies the transform, falling back to `locals` when it returns `None`.
    pub fn apply(&self, locals: Locals, renderer: &LayoutRenderer) -> Locals {
        (self.0)(&locals, renderer).unwrap_or(locals)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// One loosely typed adapter argument.
///
/// Host-facing factories accept either global locals, a transform, or nothing
/// in each position, so this mirrors that.
#[derive(Debug, Clone, Default)]
pub enum EngineArg {
    /// Not supplied.
    #[default]
    Absent,
    /// A plain value: global locals, `null`, or something invalid.
    Value(Value),
    /// A transform function.
    Transform(Transform),
}

impl EngineArg {
    /// Wraps a closure as a transform argument.
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Locals, &LayoutRenderer) -> Option<Locals> + Send + Sync + 'static,
    {
        EngineArg::Transform(Transform::new(f))
    }
}

impl From<Value> for EngineArg {
    fn from(value: Value) -> Self {
        EngineArg::Value(value)
    }
}

impl From<Locals> for EngineArg {
    fn from(locals: Locals) -> Self {
        EngineArg::Value(Value::Object(locals))
    }
}

impl From<Transform> for EngineArg {
    fn from(transform: Transform) -> Self {
        EngineArg::Transform(transform)
    }
}

impl<T: Into<EngineArg>> From<Option<T>> for EngineArg {
    fn from(arg: Option<T>) -> Self {
        arg.map_or(EngineArg::Absent, Into::into)
    }
}

/// Creates a view engine backed by a default [`LayoutRenderer`].
///
/// - If `first` is a transform, it is used as the transform, there are no global
///   locals, and `second` is ignored.
/// - Otherwise `first` must be absent, `null` or an object
///   ([`LayoutError::InvalidGlobalLocals`]), and `second` must be absent, `null`
///   or a transform ([`LayoutError::InvalidTransformFunction`]).
pub fn create_engine_adapter(
    first: impl Into<EngineArg>,
    second: impl Into<EngineArg>,
) -> Result<ViewEngine, LayoutError> {
    create_engine_adapter_with(LayoutRenderer::builder(), first, second)
}

/// Like [`create_engine_adapter`], with a custom renderer configuration.
///
/// Global locals given as an argument replace those set on the builder.
pub fn create_engine_adapter_with(
    builder: LayoutRendererBuilder,
    first: impl Into<EngineArg>,
    second: impl Into<EngineArg>,
) -> Result<ViewEngine, LayoutError> {
    let (globals, transform) = match first.into() {
        EngineArg::Transform(transform) => (None, Some(transform)),
        EngineArg::Absent => (None, transform_arg(second.into())?),
        EngineArg::Value(value) => (
            Some(GlobalLocals::from_value(value)?),
            transform_arg(second.into())?,
        ),
    };

    let builder = match globals {
        Some(globals) => builder.globals(globals),
        None => builder,
    };
    let renderer = builder.build();
    tracing::debug!(
        engine = renderer.engine_name(),
        globals = renderer.globals().as_locals().len(),
        transform = transform.is_some(),
        "created view engine adapter"
    );

    Ok(ViewEngine {
        renderer: Arc::new(renderer),
        transform,
    })
}

fn transform_arg(arg: EngineArg) -> Result<Option<Transform>, LayoutError> {
    match arg {
        EngineArg::Absent | EngineArg::Value(Value::Null) => Ok(None),
        EngineArg::Transform(transform) => Ok(Some(transform)),
        EngineArg::Value(other) => Err(LayoutError::InvalidTransformFunction(json_type(&other))),
    }
}

/// A view engine: a shared [`LayoutRenderer`] plus an optional [`Transform`].
///
/// Clones share the renderer, and with it the compiled-template cache.
#[derive(Debug, Clone)]
pub struct ViewEngine {
    renderer: Arc<LayoutRenderer>,
    transform: Option<Transform>,
}

impl ViewEngine {
    /// The renderer behind this engine.
    pub fn renderer(&self) -> &LayoutRenderer {
        &self.renderer
    }

    /// Renders a view, in the host calling convention.
    ///
    /// `callback` is invoked exactly once, with the output or the error.
    pub fn call<F>(&self, file_path: &str, options: &Locals, callback: F)
    where
        F: FnOnce(Result<String, LayoutError>),
    {
        let result = self.try_render(file_path, options);
        if let Err(err) = &result {
            tracing::debug!(
                path = file_path,
                code = err.code(),
                error = %err,
                "view render failed"
            );
        }
        callback(result);
    }

    /// Renders a view and returns the result directly.
    ///
    /// `options` is the host's option bag: `filename`, `settings.views` and
    /// `cache` configure the render, everything else becomes locals (see
    /// [`host_locals`]).
    pub fn try_render(&self, file_path: &str, options: &Locals) -> Result<String, LayoutError> {
        let resolver = self.renderer.resolver();
        resolver.validate_file_path(file_path)?;

        let mut render_options = RenderOptions::from_host_options(options);
        render_options.filename = Some(match options.get(FILENAME_KEY) {
            Some(filename) => resolver.validate_value(Some(filename))?,
            None => PathBuf::from(file_path),
        });

        let mut locals = host_locals(options);
        if let Some(transform) = &self.transform {
            locals = transform.apply(locals, &self.renderer);
        }

        self.renderer.render(file_path, &locals, &render_options)
    }

    /// Wraps this engine as a plain function for host registration.
    pub fn into_engine_fn(self) -> EngineFn {
        Arc::new(move |file_path: &str, options: &Locals, callback: RenderCallback| {
            self.call(file_path, options, callback)
        })
    }
}
