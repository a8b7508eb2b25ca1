//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types, allowing you to import
//! everything you need in one line:
//!
//! ```rust
//! use standout_layout::prelude::*;
//!
//! let files = MemoryFiles::new().with_file("/v/a.jinja", "{{ n }}");
//! let renderer = LayoutRenderer::builder().files(files).build();
//! let out = renderer.render("/v/a.jinja", &Locals::new(), &RenderOptions::new())?;
//! assert_eq!(out, "");
//! # Ok::<(), LayoutError>(())
//! ```

// Rendering
pub use crate::{LayoutConfig, LayoutRenderer, RenderOptions};

// Data
pub use crate::{GlobalLocals, Locals};

// Errors
pub use crate::LayoutError;

// Engines and sources
pub use crate::engine::{MiniJinjaEngine, SimpleEngine, TemplateEngine};
pub use crate::source::{FileSource, MemoryFiles, OsFiles};

// Host adapter
pub use crate::{create_engine_adapter, EngineArg, ViewEngine};
