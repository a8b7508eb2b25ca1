//! Compiled-template cache behavior against files on disk.

use std::fs;

use standout_layout::{LayoutConfig, LayoutRenderer, Locals, RenderOptions};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

fn renderer(cache: bool) -> LayoutRenderer {
    LayoutRenderer::builder()
        .config(LayoutConfig::new().cache(cache))
        .build()
}

#[test]
fn cached_templates_ignore_edits() {
    let temp_dir = TempDir::new().unwrap();
    let page = write(&temp_dir, "page.jinja", r#"{% set layout = "base" %}v1"#);
    write(&temp_dir, "base.jinja", "[{{ body }}]");

    let renderer = renderer(true);
    let options = RenderOptions::new();
    assert_eq!(renderer.render(&page, &Locals::new(), &options).unwrap(), "[v1]");

    write(&temp_dir, "page.jinja", r#"{% set layout = "base" %}v2"#);
    assert_eq!(renderer.render(&page, &Locals::new(), &options).unwrap(), "[v1]");
    assert_eq!(renderer.cache().len(), 2);
}

#[test]
fn uncached_templates_pick_up_edits() {
    let temp_dir = TempDir::new().unwrap();
    let page = write(&temp_dir, "page.jinja", "v1");

    let renderer = renderer(false);
    let options = RenderOptions::new();
    assert_eq!(renderer.render(&page, &Locals::new(), &options).unwrap(), "v1");

    write(&temp_dir, "page.jinja", "v2");
    assert_eq!(renderer.render(&page, &Locals::new(), &options).unwrap(), "v2");
}

#[test]
fn cached_templates_survive_deletion() {
    let temp_dir = TempDir::new().unwrap();
    let page = write(&temp_dir, "page.jinja", "kept");

    let renderer = renderer(false);
    let cached = RenderOptions::new().cache(true);
    assert_eq!(renderer.render(&page, &Locals::new(), &cached).unwrap(), "kept");

    fs::remove_file(&page).unwrap();
    assert_eq!(renderer.render(&page, &Locals::new(), &cached).unwrap(), "kept");

    // Without the cache the file system error comes through unchanged
    let err = renderer
        .render(&page, &Locals::new(), &RenderOptions::new())
        .unwrap_err();
    assert_eq!(err.code(), "ENOENT");
}

#[test]
fn clearing_the_cache_forces_a_reread() {
    let temp_dir = TempDir::new().unwrap();
    let page = write(&temp_dir, "page.jinja", "v1");

    let renderer = renderer(true);
    let options = RenderOptions::new();
    renderer.render(&page, &Locals::new(), &options).unwrap();

    write(&temp_dir, "page.jinja", "v2");
    renderer.cache().clear();
    assert_eq!(renderer.render(&page, &Locals::new(), &options).unwrap(), "v2");
}
