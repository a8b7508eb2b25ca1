//! Render-time locals.
//!
//! Locals are the key-value context a template sees while it executes. They are
//! plain JSON maps so that any `Serialize` type can be turned into locals, and
//! so that engines other than MiniJinja can consume them without conversion.
//!
//! # Reserved Keys
//!
//! | Key | Set by | Meaning |
//! |-----|--------|---------|
//! | [`BODY_KEY`] | renderer | The fully expanded output of the child, visible to layouts |
//! | [`LAYOUT_KEY`] | template | The parent layout the template asks to be wrapped in |
//! | [`FILENAME_KEY`] | renderer | Absolute path of the file being executed |
//!
//! # Precedence
//!
//! The context a template executes against is built in three layers, later
//! layers winning: [`GlobalLocals`], then the call's locals, then the reserved
//! keys written by the renderer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{json_type, LayoutError};

/// Key under which a layout receives its child's output.
pub const BODY_KEY: &str = "body";

/// Key a template sets to request a parent layout.
pub const LAYOUT_KEY: &str = "layout";

/// Key holding the path of the file being executed.
pub const FILENAME_KEY: &str = "filename";

/// The key-value context passed to a template.
pub type Locals = Map<String, Value>;

/// Returns a new map with `overlay` written over `base`.
pub fn merge(base: &Locals, overlay: &Locals) -> Locals {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Serializes a value into locals.
///
/// Fails with [`LayoutError::Template`] if serialization fails and with
/// [`LayoutError::InvalidLocals`] if the value does not serialize to an object.
pub fn to_locals<T: Serialize + ?Sized>(value: &T) -> Result<Locals, LayoutError> {
    match serde_json::to_value(value).map_err(LayoutError::template)? {
        Value::Object(map) => Ok(map),
        other => Err(LayoutError::InvalidLocals(json_type(&other))),
    }
}

/// Locals merged into every render of a renderer.
///
/// Supplied once when the renderer or adapter is constructed and immutable
/// afterwards. Cloning is cheap; clones share the same map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalLocals(Arc<Locals>);

impl GlobalLocals {
    /// Creates an empty set of global locals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds global locals from a loosely typed value.
    ///
    /// `null` means "no globals". Anything other than an object fails with
    /// [`LayoutError::InvalidGlobalLocals`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use standout_layout::GlobalLocals;
    /// use serde_json::json;
    ///
    /// let globals = GlobalLocals::from_value(json!({"site": "Docs"})).unwrap();
    /// assert_eq!(globals.get("site"), Some(&json!("Docs")));
    ///
    /// let err = GlobalLocals::from_value(json!("this is not an object")).unwrap_err();
    /// assert_eq!(err.code(), "INVALID_GLOBAL_LOCALS");
    /// ```
    pub fn from_value(value: Value) -> Result<Self, LayoutError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(Self(Arc::new(map))),
            other => Err(LayoutError::InvalidGlobalLocals(json_type(&other))),
        }
    }

    /// Looks up a global by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the underlying map.
    pub fn as_locals(&self) -> &Locals {
        &self.0
    }

    /// Whether no globals are defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Locals> for GlobalLocals {
    fn from(map: Locals) -> Self {
        Self(Arc::new(map))
    }
}
