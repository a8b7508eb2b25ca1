//! # Standout Layout - Layouts and Includes for File-Based Templates
//!
//! `standout-layout` renders template files that wrap themselves in layouts and
//! pull in other files as includes. It sits between a template engine (MiniJinja
//! by default) and the file system, and exposes a view-engine adapter so web
//! frameworks that render views by extension can use it directly.
//!
//! ## Core Concepts
//!
//! - [`LayoutRenderer`]: Renders a file, its includes and its layout chain
//! - [`PathResolver`]: Validates template paths and resolves relative references
//! - [`create_engine_adapter`]: Builds a [`ViewEngine`] in the host calling convention
//! - [`engine::TemplateEngine`]: The seam for template backends
//! - [`source::FileSource`]: The seam for where template files come from
//!
//! ## Quick Start
//!
//! ```rust
//! use standout_layout::{LayoutRenderer, Locals, RenderOptions};
//! use standout_layout::source::MemoryFiles;
//!
//! let files = MemoryFiles::new()
//!     .with_file(
//!         "/views/index.jinja",
//!         r#"{% set layout = "layout" %}<h1>{{ title }}</h1>{{ include("partials/footer") }}"#,
//!     )
//!     .with_file("/views/partials/footer.jinja", "<footer>{{ site }}</footer>")
//!     .with_file("/views/layout.jinja", "<body>{{ body }}</body>");
//!
//! let renderer = LayoutRenderer::builder().files(files).build();
//!
//! let mut locals = Locals::new();
//! locals.insert("title".into(), "Welcome".into());
//! locals.insert("site".into(), "Docs".into());
//!
//! let html = renderer
//!     .render("/views/index.jinja", &locals, &RenderOptions::default())
//!     .unwrap();
//! assert_eq!(html, "<body><h1>Welcome</h1><footer>Docs</footer></body>");
//! ```
//!
//! ## Template Protocol
//!
//! With the default MiniJinja engine:
//!
//! | In the template | Effect |
//! |-----------------|--------|
//! | `{% set layout = "base" %}` | Wrap this file's output in `base.jinja` |
//! | `{% set layout = false %}` | No layout (same as never setting it) |
//! | `{{ include("partials/nav") }}` | Render `partials/nav.jinja` here |
//! | `{{ include("row", {"n": 1}) }}` | Same, with extra locals |
//! | `{{ body }}` | In a layout: the child's fully expanded output |
//! | `{{ filename }}` | Path of the file being rendered |
//!
//! References resolve against the directory of the file that makes them. Bare
//! names such as `"base"` are also looked up in ancestor directories up to the
//! configured views root.
//!
//! ## Host Adapter
//!
//! ```rust
//! use standout_layout::{create_engine_adapter, EngineArg};
//! use serde_json::json;
//!
//! // Globals plus a transform that runs once per top-level render
//! let engine = create_engine_adapter(
//!     json!({"site": "Docs"}),
//!     EngineArg::transform(|locals, _renderer| {
//!         let mut locals = locals.clone();
//!         locals.insert("year".into(), json!(2024));
//!         Some(locals)
//!     }),
//! )
//! .unwrap();
//!
//! engine.call("/no/such/view.jinja", &Default::default(), |result| {
//!     assert_eq!(result.unwrap_err().code(), "ENOENT");
//! });
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`LayoutError`]. Validation failures have their own
//! variants; file system and engine failures pass through unchanged, so
//! [`LayoutError::code`] reports e.g. `ENOENT` for a missing file.

pub mod adapter;
pub mod cache;
pub mod engine;
mod error;
pub mod locals;
pub mod options;
pub mod path;
pub mod prelude;
pub mod renderer;
pub mod source;

// Error types
pub use error::LayoutError;

// Locals and configuration
pub use locals::{GlobalLocals, Locals};
pub use options::{LayoutConfig, RenderOptions};

// Paths
pub use path::{PathResolver, TemplateReference};

// Rendering
pub use renderer::{LayoutRenderer, LayoutRendererBuilder};

// Host adapter
pub use adapter::{
    create_engine_adapter, create_engine_adapter_with, EngineArg, EngineFn, RenderCallback,
    Transform, ViewEngine,
};
