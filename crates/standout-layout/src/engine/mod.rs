//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait which lets the layout renderer
//! work with different template backends. The renderer only needs two things from
//! an engine: compile a source string once, and execute the compiled template
//! against a context as often as it likes.
//!
//! # Execution Protocol
//!
//! Executing a template does not render layouts or includes itself. Instead it
//! reports what the template asked for in an [`Execution`]:
//!
//! - `output`: the text, with an include marker (see [`include_marker`]) wherever
//!   the template called `include`
//! - `layout`: the value the template left in its `layout` variable
//! - `includes`: the include calls, in call order
//! - `marker_key`: the random key embedded in this execution's markers
//!
//! The renderer resolves and renders each include, splices the results in with
//! [`splice_includes`], and then wraps the result in the requested layout. Engines
//! stay free of file system access and recursion.
//!
//! Marker keys are drawn fresh for every execution, so marker-like text coming from
//! locals never matches. A marker that a filter altered is not silently left in
//! the output: splicing fails with [`LayoutError::IncludeAltered`].
//!
//! Two engines are provided:
//!
//! - [`MiniJinjaEngine`]: full Jinja2 syntax (the default)
//! - [`SimpleEngine`]: `{name}` substitution with `{@include}`/`{@layout}` directives

mod jinja;
mod simple;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::error::LayoutError;
use crate::locals::Locals;

pub use self::jinja::MiniJinjaEngine;
pub use self::simple::SimpleEngine;

/// Delimits include markers.
const MARKER_DELIMITER: char = '\u{1A}';

/// Forces marker keys to 19 decimal digits.
const MARKER_KEY_HIGH_BIT: u64 = 1 << 63;

/// A template engine that compiles template sources.
pub trait TemplateEngine: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Compiles a template source.
    ///
    /// Syntax errors are reported here, as [`LayoutError::Template`].
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledTemplate>, LayoutError>;
}

/// A compiled template, ready to execute.
///
/// Compiled templates may be cached and executed concurrently; they must not
/// keep per-execution state.
pub trait CompiledTemplate: Send + Sync {
    /// Executes the template against `context`.
    fn execute(&self, context: &Locals) -> Result<Execution, LayoutError>;
}

/// Options handed to [`TemplateEngine::compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOptions {
    /// Absolute path of the file being compiled.
    pub filename: PathBuf,
    /// Engine-specific options, passed through from
    /// [`RenderOptions::compile`](crate::RenderOptions::compile).
    pub extra: Locals,
}

impl CompileOptions {
    /// Reads a boolean engine option.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }
}

/// The outcome of executing a template once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    /// Rendered text with include markers in place of included output.
    pub output: String,
    /// Value of the template's `layout` variable after execution (`Null` if unset).
    pub layout: Value,
    /// Include calls in the order they were made.
    pub includes: Vec<IncludeRequest>,
    /// Key of the markers in `output`, see [`new_marker_key`].
    pub marker_key: u64,
}

impl Execution {
    /// An execution with plain output and no requests.
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }
}

/// One `include` call made during execution.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeRequest {
    /// The reference as written in the template.
    pub reference: String,
    /// Locals passed to the include, layered over the including file's locals.
    pub locals: Locals,
}

/// Collects include requests during one execution and hands out markers.
#[derive(Debug)]
pub(crate) struct IncludeRecorder {
    key: u64,
    requests: Vec<IncludeRequest>,
}

impl IncludeRecorder {
    pub(crate) fn new() -> Self {
        Self {
            key: new_marker_key(),
            requests: Vec::new(),
        }
    }

    /// Records a request and returns the marker to emit in its place.
    pub(crate) fn record(&mut self, reference: String, locals: Locals) -> String {
        let index = self.requests.len();
        self.requests.push(IncludeRequest { reference, locals });
        include_marker(self.key, index)
    }

    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn into_requests(self) -> Vec<IncludeRequest> {
        self.requests
    }
}

impl Default for IncludeRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a fresh marker key. Engines call this once per execution.
pub fn new_marker_key() -> u64 {
    rand::random::<u64>() | MARKER_KEY_HIGH_BIT
}

/// The placeholder for the `index`-th include of the execution keyed `key`.
pub fn include_marker(key: u64, index: usize) -> String {
    format!("{MARKER_DELIMITER}{key}:{index}{MARKER_DELIMITER}")
}

/// Replaces include markers in `output` with the rendered includes.
///
/// Markers are matched in a single pass, so rendered include text is never
/// rescanned. Only markers carrying `key` are recognized; any other text,
/// including markers of other executions, is kept as it is.
///
/// # Errors
///
/// [`LayoutError::IncludeAltered`] when a marker for `key` was changed on its way
/// into `output` (a filter applied to the result of `include`, for example).
///
/// # Example
///
/// ```rust
/// use standout_layout::engine::{include_marker, new_marker_key, splice_includes};
///
/// let key = new_marker_key();
/// let output = format!("<nav>{}</nav><main>{}</main>", include_marker(key, 0), include_marker(key, 1));
/// let spliced = splice_includes(&output, key, &["menu".to_string(), "text".to_string()]).unwrap();
/// assert_eq!(spliced, "<nav>menu</nav><main>text</main>");
/// ```
pub fn splice_includes(output: &str, key: u64, rendered: &[String]) -> Result<String, LayoutError> {
    if rendered.is_empty() {
        return Ok(output.to_string());
    }

    let key = key.to_string();
    let prefix = format!("{MARKER_DELIMITER}{key}:");
    let mut result = String::with_capacity(output.len());
    let mut rest = output;

    while let Some(start) = rest.find(&prefix) {
        let literal = &rest[..start];
        if literal.contains(&key) {
            return Err(LayoutError::IncludeAltered);
        }
        result.push_str(literal);

        let after = &rest[start + prefix.len()..];
        let (index, end) = after
            .find(MARKER_DELIMITER)
            .and_then(|end| Some((after[..end].parse::<usize>().ok()?, end)))
            .filter(|(index, _)| *index < rendered.len())
            .ok_or(LayoutError::IncludeAltered)?;

        result.push_str(&rendered[index]);
        rest = &after[end + MARKER_DELIMITER.len_utf8()..];
    }

    if rest.contains(&key) {
        return Err(LayoutError::IncludeAltered);
    }
    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: u64 = 9_223_372_036_854_775_907;

    fn rendered(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn test_splice_in_order() {
        let output = format!("a{}b{}c", include_marker(KEY, 0), include_marker(KEY, 1));
        let spliced = splice_includes(&output, KEY, &rendered(&["X", "Y"])).unwrap();
        assert_eq!(spliced, "aXbYc");
    }

    #[test]
    fn test_splice_repeated_marker() {
        let marker = include_marker(KEY, 0);
        let output = format!("{marker}-{marker}");
        let spliced = splice_includes(&output, KEY, &rendered(&["X"])).unwrap();
        assert_eq!(spliced, "X-X");
    }

    #[test]
    fn test_splice_does_not_rescan_included_text() {
        // The first include's output happens to contain a marker for index 1
        let output = format!("{}|{}", include_marker(KEY, 0), include_marker(KEY, 1));
        let first = include_marker(KEY, 1);
        let spliced = splice_includes(&output, KEY, &[first.clone(), "second".into()]).unwrap();
        assert_eq!(spliced, format!("{first}|second"));
    }

    #[test]
    fn test_splice_ignores_other_keys() {
        let foreign = include_marker(KEY + 1, 0);
        let output = format!("{}{}", include_marker(KEY, 0), foreign);
        let spliced = splice_includes(&output, KEY, &rendered(&["X"])).unwrap();
        assert_eq!(spliced, format!("X{foreign}"));
    }

    #[test]
    fn test_splice_rejects_out_of_range_marker() {
        let output = format!("a{}b", include_marker(KEY, 5));
        let err = splice_includes(&output, KEY, &rendered(&["X"])).unwrap_err();
        assert!(matches!(err, LayoutError::IncludeAltered));
    }

    #[test]
    fn test_splice_rejects_altered_marker() {
        // A marker that lost its leading delimiter
        let marker = include_marker(KEY, 0);
        let altered = &marker[MARKER_DELIMITER.len_utf8()..];
        let err = splice_includes(altered, KEY, &rendered(&["X"])).unwrap_err();
        assert_eq!(err.code(), "INCLUDE_ALTERED");
    }

    #[test]
    fn test_splice_no_includes_is_identity() {
        assert_eq!(splice_includes("plain", KEY, &[]).unwrap(), "plain");
    }

    #[test]
    fn test_recorder_indexes_in_call_order() {
        let mut recorder = IncludeRecorder::new();
        let key = recorder.key();
        assert_eq!(recorder.record("a".into(), Locals::new()), include_marker(key, 0));
        assert_eq!(recorder.record("b".into(), Locals::new()), include_marker(key, 1));
        let requests = recorder.into_requests();
        assert_eq!(requests[0].reference, "a");
        assert_eq!(requests[1].reference, "b");
    }

    #[test]
    fn test_marker_keys_differ_per_recorder() {
        let first = IncludeRecorder::new().key();
        let second = IncludeRecorder::new().key();
        assert_ne!(first, second);
        assert_eq!(first.to_string().len(), 19);
    }

    #[test]
    fn test_compile_options_flag() {
        let mut options = CompileOptions::default();
        options.extra.insert("trim_blocks".into(), Value::Bool(true));
        options.extra.insert("other".into(), Value::from("yes"));
        assert_eq!(options.flag("trim_blocks"), Some(true));
        assert_eq!(options.flag("other"), None);
        assert_eq!(options.flag("missing"), None);
    }
}
