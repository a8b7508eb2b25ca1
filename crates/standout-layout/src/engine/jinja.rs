//! MiniJinja-based template engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use minijinja::value::{Object, Value};
use minijinja::{Environment, Error, ErrorKind, State, UndefinedBehavior};

use super::{
    CompileOptions, CompiledTemplate, Execution, IncludeRecorder, IncludeRequest, TemplateEngine,
};
use crate::error::LayoutError;
use crate::locals::{Locals, BODY_KEY, LAYOUT_KEY};

/// Context key carrying the include recorder into an execution.
const RECORDER_KEY: &str = "__standout_layout_includes";

/// MiniJinja-based template engine.
///
/// This is the default engine, providing full Jinja2-compatible syntax. On top of
/// MiniJinja it adds the layout protocol:
///
/// - `{% set layout = "base" %}` at the top level requests a parent layout
/// - `{{ include("partials/nav") }}` includes another template in place
/// - `{{ include("row", {"n": 1}) }}` includes with extra locals
/// - `{{ body }}` in a layout is the child's output (never escaped)
///
/// Trailing newlines are kept by default so that output matches template files
/// byte for byte.
///
/// # Compile Options
///
/// | Option | Effect |
/// |--------|--------|
/// | `trim_blocks` | Remove the first newline after a block tag |
/// | `lstrip_blocks` | Strip whitespace before a block tag |
/// | `keep_trailing_newline` | Keep the final newline (default `true`) |
/// | `strict_undefined` | Fail on undefined variables |
///
/// # Example
///
/// ```rust
/// use standout_layout::engine::{CompileOptions, MiniJinjaEngine, TemplateEngine};
/// use serde_json::json;
///
/// let engine = MiniJinjaEngine::new();
/// let template = engine
///     .compile(
///         r#"{% set layout = "base" %}Hello, {{ name }}!"#,
///         &CompileOptions::default(),
///     )
///     .unwrap();
///
/// let context = json!({"name": "World"}).as_object().cloned().unwrap();
/// let execution = template.execute(&context).unwrap();
/// assert_eq!(execution.output, "Hello, World!");
/// assert_eq!(execution.layout, json!("base"));
/// ```
#[derive(Debug)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    /// Creates a new MiniJinja engine with the `include` function registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_function("include", include);
        Self { env }
    }

    /// Returns a reference to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    ///
    /// Filters, functions and globals registered here are available to every
    /// template compiled afterwards.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn name(&self) -> &'static str {
        "minijinja"
    }

    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledTemplate>, LayoutError> {
        let mut env = self.env.clone();
        if let Some(enabled) = options.flag("trim_blocks") {
            env.set_trim_blocks(enabled);
        }
        if let Some(enabled) = options.flag("lstrip_blocks") {
            env.set_lstrip_blocks(enabled);
        }
        if let Some(enabled) = options.flag("keep_trailing_newline") {
            env.set_keep_trailing_newline(enabled);
        }
        if options.flag("strict_undefined") == Some(true) {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        let name = if options.filename.as_os_str().is_empty() {
            "<string>".to_string()
        } else {
            options.filename.display().to_string()
        };
        env.add_template_owned(name.clone(), source.to_string())?;

        Ok(Arc::new(MiniJinjaTemplate { env, name }))
    }
}

/// A template compiled into its own environment.
struct MiniJinjaTemplate {
    env: Environment<'static>,
    name: String,
}

impl CompiledTemplate for MiniJinjaTemplate {
    fn execute(&self, context: &Locals) -> Result<Execution, LayoutError> {
        let calls = Value::from_object(IncludeCalls::default());

        let mut ctx: BTreeMap<String, Value> = context
            .iter()
            .map(|(key, value)| (key.clone(), to_template_value(key, value)))
            .collect();
        ctx.insert(RECORDER_KEY.to_string(), calls.clone());

        let template = self.env.get_template(&self.name)?;
        let captured = template.render_captured(&ctx)?;

        let layout = match captured.state().lookup(LAYOUT_KEY) {
            Some(value) if !value.is_undefined() && !value.is_none() => {
                serde_json::to_value(&value).map_err(LayoutError::template)?
            }
            _ => serde_json::Value::Null,
        };
        let output = captured.into_output();

        let (marker_key, includes) = calls
            .downcast_object_ref::<IncludeCalls>()
            .map(IncludeCalls::finish)
            .unwrap_or_default();

        Ok(Execution {
            output,
            layout,
            includes,
            marker_key,
        })
    }
}

/// Converts a local into a template value. The child body is already rendered
/// text and is marked safe so auto-escaping never touches it.
fn to_template_value(key: &str, value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) if key == BODY_KEY => Value::from_safe_string(s.clone()),
        other => Value::from_serialize(other),
    }
}

/// Include calls recorded during one execution.
#[derive(Debug, Default)]
struct IncludeCalls(Mutex<IncludeRecorder>);

impl IncludeCalls {
    /// Returns the marker key and the recorded requests.
    fn finish(&self) -> (u64, Vec<IncludeRequest>) {
        let mut recorder = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        (recorder.key(), std::mem::take(&mut recorder.requests))
    }
}

impl Object for IncludeCalls {}

/// The `include(reference, locals=none)` template function.
fn include(state: &State, reference: String, locals: Option<Value>) -> Result<Value, Error> {
    let calls = state.lookup(RECORDER_KEY).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            "include() is only available when rendering through a layout renderer",
        )
    })?;
    let calls = calls.downcast_object_ref::<IncludeCalls>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("`{}` is reserved for include bookkeeping", RECORDER_KEY),
        )
    })?;

    let locals = match locals {
        None => Locals::new(),
        Some(value) if value.is_none() || value.is_undefined() => Locals::new(),
        Some(value) => match serde_json::to_value(&value) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    "include() locals must be a map",
                ))
            }
            Err(err) => {
                return Err(Error::new(
                    ErrorKind::BadSerialization,
                    "include() locals could not be converted",
                )
                .with_source(err))
            }
        },
    };

    let marker = calls
        .0
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(reference, locals);
    Ok(Value::from_safe_string(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::include_marker;
    use serde_json::json;

    fn compile(source: &str) -> Arc<dyn CompiledTemplate> {
        MiniJinjaEngine::new()
            .compile(source, &CompileOptions::default())
            .unwrap()
    }

    fn ctx(value: serde_json::Value) -> Locals {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_plain_output() {
        let template = compile("Hello, {{ name }}!");
        let execution = template.execute(&ctx(json!({"name": "World"}))).unwrap();
        assert_eq!(execution.output, "Hello, World!");
        assert_eq!(execution.layout, serde_json::Value::Null);
        assert!(execution.includes.is_empty());
    }

    #[test]
    fn test_keeps_trailing_newline() {
        let template = compile("line\n");
        let execution = template.execute(&Locals::new()).unwrap();
        assert_eq!(execution.output, "line\n");
    }

    #[test]
    fn test_trailing_newline_can_be_dropped() {
        let mut options = CompileOptions::default();
        options
            .extra
            .insert("keep_trailing_newline".into(), json!(false));
        let template = MiniJinjaEngine::new().compile("line\n", &options).unwrap();
        assert_eq!(template.execute(&Locals::new()).unwrap().output, "line");
    }

    #[test]
    fn test_layout_is_reported() {
        let template = compile(r#"{% set layout = "layouts/base" %}child"#);
        let execution = template.execute(&Locals::new()).unwrap();
        assert_eq!(execution.output, "child");
        assert_eq!(execution.layout, json!("layouts/base"));
    }

    #[test]
    fn test_falsy_layout_is_reported_as_is() {
        let template = compile("{% set layout = false %}child");
        let execution = template.execute(&Locals::new()).unwrap();
        assert_eq!(execution.layout, json!(false));
    }

    #[test]
    fn test_includes_are_recorded_in_order() {
        let template = compile(r#"<{{ include("a") }}|{{ include("b", {"n": 2}) }}>"#);
        let execution = template.execute(&Locals::new()).unwrap();

        let key = execution.marker_key;
        assert_eq!(
            execution.output,
            format!("<{}|{}>", include_marker(key, 0), include_marker(key, 1))
        );
        assert_eq!(execution.includes.len(), 2);
        assert_eq!(execution.includes[0].reference, "a");
        assert!(execution.includes[0].locals.is_empty());
        assert_eq!(execution.includes[1].reference, "b");
        assert_eq!(execution.includes[1].locals.get("n"), Some(&json!(2)));
    }

    #[test]
    fn test_include_in_loop() {
        let template = compile(r#"{% for i in items %}{{ include("row", {"i": i}) }}{% endfor %}"#);
        let execution = template
            .execute(&ctx(json!({"items": [1, 2, 3]})))
            .unwrap();
        let indexes: Vec<_> = execution
            .includes
            .iter()
            .map(|r| r.locals.get("i").cloned().unwrap())
            .collect();
        assert_eq!(indexes, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_include_rejects_non_map_locals() {
        let template = compile(r#"{{ include("a", 3) }}"#);
        let err = template.execute(&Locals::new()).unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_executions_do_not_share_includes() {
        let template = compile(r#"{{ include("a") }}"#);
        let first = template.execute(&Locals::new()).unwrap();
        let second = template.execute(&Locals::new()).unwrap();
        assert_eq!(first.includes.len(), 1);
        assert_eq!(second.includes.len(), 1);
        assert_ne!(first.marker_key, second.marker_key);
    }

    #[test]
    fn test_include_marker_survives_case_filters() {
        let template = compile(r#"{{ include("a") | upper }}"#);
        let execution = template.execute(&Locals::new()).unwrap();
        assert_eq!(execution.output, include_marker(execution.marker_key, 0));
    }

    #[test]
    fn test_body_is_not_escaped() {
        let options = CompileOptions {
            filename: "/views/layout.html".into(),
            ..CompileOptions::default()
        };
        let template = MiniJinjaEngine::new()
            .compile("<main>{{ body }}</main>{{ title }}", &options)
            .unwrap();
        let execution = template
            .execute(&ctx(json!({"body": "<p>hi</p>", "title": "<b>"})))
            .unwrap();
        assert_eq!(execution.output, "<main><p>hi</p></main>&lt;b&gt;");
    }

    #[test]
    fn test_syntax_error_on_compile() {
        let result = MiniJinjaEngine::new().compile("{{ unclosed", &CompileOptions::default());
        let err = result.err().unwrap();
        assert_eq!(err.code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_strict_undefined() {
        let mut options = CompileOptions::default();
        options.extra.insert("strict_undefined".into(), json!(true));
        let template = MiniJinjaEngine::new()
            .compile("{{ missing }}", &options)
            .unwrap();
        assert!(template.execute(&Locals::new()).is_err());
    }

    #[test]
    fn test_custom_filter() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .environment_mut()
            .add_filter("shout", |value: String| value.to_uppercase());
        let template = engine
            .compile("{{ name | shout }}", &CompileOptions::default())
            .unwrap();
        let execution = template.execute(&ctx(json!({"name": "hey"}))).unwrap();
        assert_eq!(execution.output, "HEY");
    }
}
