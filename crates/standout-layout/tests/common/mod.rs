//! A minimal host application for exercising the view-engine adapter.
//!
//! It behaves like a web framework that renders views by extension: engines are
//! registered per extension, view names are resolved under a views directory,
//! and every render ends in exactly one response (200 with HTML, or 500).

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use serde_json::{json, Value};
use standout_layout::{EngineFn, Locals};

/// Directory holding the fixture views.
pub fn views_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/views")
}

/// Reads an expected-output fixture.
pub fn expected(name: &str) -> String {
    std::fs::read_to_string(views_dir().join(name)).unwrap()
}

/// Turns a JSON object literal into locals.
pub fn locals(value: Value) -> Locals {
    value.as_object().cloned().unwrap()
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
    /// Error code reported by the engine, for failed renders.
    pub error_code: Option<&'static str>,
    /// How many times the engine invoked its callback.
    pub callbacks: usize,
}

/// The host application.
pub struct App {
    views: PathBuf,
    view_engine: String,
    engines: HashMap<String, EngineFn>,
    locals: Locals,
}

impl App {
    pub fn new(views: impl Into<PathBuf>) -> Self {
        Self {
            views: views.into(),
            view_engine: String::new(),
            engines: HashMap::new(),
            locals: Locals::new(),
        }
    }

    /// Sets the extension used for view names without one.
    pub fn set_view_engine(&mut self, extension: &str) {
        self.view_engine = extension.trim_start_matches('.').to_string();
    }

    /// Registers an engine for an extension.
    pub fn engine(&mut self, extension: &str, engine: EngineFn) {
        self.engines
            .insert(extension.trim_start_matches('.').to_string(), engine);
    }

    /// Application-wide locals, passed to engines as `_locals`.
    pub fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }

    /// Resolves a view name to a file path and its extension.
    fn lookup(&self, view: &str) -> (PathBuf, String) {
        let path = Path::new(view);
        let (path, extension) = match path.extension().and_then(|e| e.to_str()) {
            Some(extension) => (path.to_path_buf(), extension.to_string()),
            None => (
                PathBuf::from(format!("{}.{}", view, self.view_engine)),
                self.view_engine.clone(),
            ),
        };
        if path.is_absolute() {
            (path, extension)
        } else {
            (self.views.join(path), extension)
        }
    }

    /// Renders a view into a response.
    pub fn render(&self, view: &str, render_locals: Locals) -> Response {
        let (path, extension) = self.lookup(view);
        let Some(engine) = self.engines.get(&extension) else {
            return Response {
                status: 500,
                content_type: None,
                body: format!("no engine for .{}", extension),
                error_code: None,
                callbacks: 0,
            };
        };

        let path = path.display().to_string();
        let mut options = render_locals;
        options.insert(
            "settings".into(),
            json!({"views": self.views.display().to_string(), "view engine": self.view_engine}),
        );
        options.insert("_locals".into(), Value::Object(self.locals.clone()));
        options.insert("cache".into(), Value::Bool(false));
        options.insert("filename".into(), Value::String(path.clone()));

        let (tx, rx) = mpsc::channel();
        engine(
            &path,
            &options,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        let results: Vec<_> = rx.try_iter().collect();
        let callbacks = results.len();
        match results.into_iter().next() {
            Some(Ok(html)) => Response {
                status: 200,
                content_type: Some("text/html; charset=utf-8"),
                body: html,
                error_code: None,
                callbacks,
            },
            Some(Err(err)) => Response {
                status: 500,
                content_type: Some("text/plain; charset=utf-8"),
                body: "error".into(),
                error_code: Some(err.code()),
                callbacks,
            },
            None => Response {
                status: 500,
                content_type: None,
                body: "engine never responded".into(),
                error_code: None,
                callbacks,
            },
        }
    }
}
