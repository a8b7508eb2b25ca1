//! Simple template engine using format-string style substitution.
//!
//! This module provides [`SimpleEngine`], a lightweight engine that uses
//! `{variable}` syntax for substitution. It's much lighter than MiniJinja and
//! suitable for layouts and partials that don't need loops, conditionals or
//! filters.
//!
//! # Syntax
//!
//! - `{name}` - Simple variable substitution
//! - `{user.name}` - Nested property access via dot notation
//! - `{items.0}` - Array index access
//! - `{@include path}` - Include another template in place
//! - `{@layout path}` - Wrap this template's output in a layout
//! - `{{` and `}}` - Escaped braces (renders as `{` and `}`)
//!
//! # Example
//!
//! ```rust
//! use standout_layout::engine::{CompileOptions, SimpleEngine, TemplateEngine};
//! use serde_json::json;
//!
//! let engine = SimpleEngine::new();
//! let template = engine
//!     .compile("{@layout base}Hello, {name}!", &CompileOptions::default())
//!     .unwrap();
//!
//! let context = json!({"name": "World"}).as_object().cloned().unwrap();
//! let execution = template.execute(&context).unwrap();
//!
//! assert_eq!(execution.output, "Hello, World!");
//! assert_eq!(execution.layout, json!("base"));
//! ```

use std::sync::Arc;

use serde_json::Value;

use super::{CompileOptions, CompiledTemplate, Execution, IncludeRecorder, TemplateEngine};
use crate::error::LayoutError;
use crate::locals::Locals;

/// Errors raised while parsing a simple template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimpleTemplateError {
    /// A `{` was never closed.
    #[error("unclosed variable substitution: {{{0}")]
    Unclosed(String),

    /// `{}` with nothing inside.
    #[error("empty variable name in template")]
    EmptyName,

    /// `{@something}` with an unknown directive.
    #[error("unknown directive: @{0}")]
    UnknownDirective(String),

    /// `{@include}` or `{@layout}` without a reference.
    #[error("directive @{0} needs a template reference")]
    MissingReference(String),
}

/// A lightweight template engine using format-string style substitution.
///
/// Missing variables are left in place (`{missing}`) to make them easy to spot.
///
/// # Thread Safety
///
/// `SimpleEngine` and its compiled templates are `Send + Sync` and can be shared
/// across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEngine;

impl SimpleEngine {
    /// Creates a new SimpleEngine.
    pub fn new() -> Self {
        Self
    }

    /// Parses a template into segments.
    fn parse(template: &str) -> Result<Vec<Segment>, SimpleTemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '{' {
                if chars.peek() == Some(&'{') {
                    // Escaped brace: {{ -> {
                    chars.next();
                    text.push('{');
                    continue;
                }

                let mut inner = String::new();
                let mut found_close = false;
                for inner_ch in chars.by_ref() {
                    if inner_ch == '}' {
                        found_close = true;
                        break;
                    }
                    inner.push(inner_ch);
                }

                if !found_close {
                    return Err(SimpleTemplateError::Unclosed(inner));
                }

                let inner = inner.trim();
                if inner.is_empty() {
                    return Err(SimpleTemplateError::EmptyName);
                }

                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Self::parse_tag(inner)?);
            } else if ch == '}' {
                if chars.peek() == Some(&'}') {
                    // Escaped brace: }} -> }
                    chars.next();
                }
                text.push('}');
            } else {
                text.push(ch);
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(segments)
    }

    /// Parses the inside of a `{...}` tag.
    fn parse_tag(inner: &str) -> Result<Segment, SimpleTemplateError> {
        let Some(directive) = inner.strip_prefix('@') else {
            return Ok(Segment::Var(inner.to_string()));
        };

        let (name, reference) = match directive.split_once(char::is_whitespace) {
            Some((name, reference)) => (name, reference.trim()),
            None => (directive, ""),
        };

        let build: fn(String) -> Segment = match name {
            "include" => Segment::Include,
            "layout" => Segment::Layout,
            other => return Err(SimpleTemplateError::UnknownDirective(other.to_string())),
        };
        if reference.is_empty() {
            return Err(SimpleTemplateError::MissingReference(name.to_string()));
        }
        Ok(build(reference.to_string()))
    }

    /// Resolves a dotted path in the context.
    ///
    /// Supports:
    /// - Simple keys: `name`
    /// - Nested objects: `user.profile.name`
    /// - Array indices: `items.0` or `items.0.name`
    fn resolve_path<'a>(context: &'a Locals, path: &str) -> Option<&'a Value> {
        let mut parts = path.split('.');
        let mut current = context.get(parts.next()?)?;

        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }

    /// Formats a JSON value as a string for output.
    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            // For arrays and objects, use JSON representation
            Value::Array(_) | Value::Object(_) => value.to_string(),
        }
    }
}

impl TemplateEngine for SimpleEngine {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn compile(
        &self,
        source: &str,
        _options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledTemplate>, LayoutError> {
        let segments = Self::parse(source).map_err(LayoutError::template)?;
        Ok(Arc::new(SimpleTemplate { segments }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
    Include(String),
    Layout(String),
}

/// A parsed simple template.
#[derive(Debug)]
struct SimpleTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate for SimpleTemplate {
    fn execute(&self, context: &Locals) -> Result<Execution, LayoutError> {
        let mut output = String::new();
        let mut layout = Value::Null;
        let mut recorder = IncludeRecorder::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Var(name) => match SimpleEngine::resolve_path(context, name) {
                    Some(value) => output.push_str(&SimpleEngine::format_value(value)),
                    // Variable not found - leave placeholder for debugging
                    None => {
                        output.push('{');
                        output.push_str(name);
                        output.push('}');
                    }
                },
                Segment::Include(reference) => {
                    output.push_str(&recorder.record(reference.clone(), Locals::new()));
                }
                Segment::Layout(reference) => layout = Value::String(reference.clone()),
            }
        }

        Ok(Execution {
            output,
            layout,
            marker_key: recorder.key(),
            includes: recorder.into_requests(),
        })
    }
}
