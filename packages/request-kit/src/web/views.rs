//! Server-side views.
//!
//! Handlers name a view by its path relative to the view root, with or
//! without a leading slash (`/modulo/accion.html` and `modulo/accion.html`
//! are the same view). The engine is registered as
//! `web::Data<dyn ViewEngine>`; see [`views_data`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use actix_web::web;
use minijinja::Environment;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Default view root, relative to the working directory.
pub const DEFAULT_VIEW_ROOT: &str = "templates";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("invalid view path: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Render(#[from] minijinja::Error),
}

pub trait ViewEngine: Send + Sync {
    /// Render the view at `path` with `ctx` as its context.
    fn render(&self, path: &str, ctx: &JsonValue) -> Result<String, ViewError>;
}

/// Wrap `engine` for `App::app_data`.
pub fn views_data<V: ViewEngine + 'static>(engine: V) -> web::Data<dyn ViewEngine> {
    let engine: Arc<dyn ViewEngine> = Arc::new(engine);
    web::Data::from(engine)
}

/// `path` with exactly one leading slash.
pub fn normalize_view_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Template name under the view root, or `None` if `path` escapes it.
fn template_name(path: &str) -> Option<String> {
    let normalized = normalize_view_path(path);
    let mut name = PathBuf::new();
    for comp in Path::new(normalized.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => name.push(s),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if name.as_os_str().is_empty() {
        return None;
    }
    // minijinja names always use forward slashes
    Some(name.to_string_lossy().replace('\\', "/"))
}

/// minijinja templates loaded from a directory.
pub struct MiniJinjaViews {
    env: Environment<'static>,
}

impl MiniJinjaViews {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(root.as_ref()));
        Self { env }
    }
}

impl Default for MiniJinjaViews {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW_ROOT)
    }
}

impl ViewEngine for MiniJinjaViews {
    fn render(&self, path: &str, ctx: &JsonValue) -> Result<String, ViewError> {
        let name = template_name(path).ok_or_else(|| ViewError::InvalidPath(path.to_string()))?;
        let template = self.env.get_template(&name)?;
        Ok(template.render(ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn views_with(files: &[(&str, &str)]) -> (tempfile::TempDir, MiniJinjaViews) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let views = MiniJinjaViews::new(dir.path());
        (dir, views)
    }

    #[test]
    fn test_normalize_view_path() {
        assert_eq!(normalize_view_path("modulo/accion.html"), "/modulo/accion.html");
        assert_eq!(normalize_view_path("/modulo/accion.html"), "/modulo/accion.html");
    }

    #[test]
    fn test_template_name_rejects_traversal() {
        assert_eq!(template_name("/a/b.html").as_deref(), Some("a/b.html"));
        assert_eq!(template_name("./a.html").as_deref(), Some("a.html"));
        assert!(template_name("../secret.html").is_none());
        assert!(template_name("/").is_none());
    }

    #[test]
    fn test_render_with_and_without_leading_slash() {
        let (_dir, views) = views_with(&[("clientes/ver.html", "Hola {{ nombre }}")]);
        let ctx = json!({ "nombre": "Ana" });

        assert_eq!(views.render("/clientes/ver.html", &ctx).unwrap(), "Hola Ana");
        assert_eq!(views.render("clientes/ver.html", &ctx).unwrap(), "Hola Ana");
    }

    #[test]
    fn test_missing_template_is_render_error() {
        let (_dir, views) = views_with(&[]);
        let err = views.render("/nope.html", &json!({})).unwrap_err();
        assert!(matches!(err, ViewError::Render(_)));
    }

    #[test]
    fn test_traversal_is_invalid_path() {
        let (_dir, views) = views_with(&[]);
        let err = views.render("../etc/passwd", &json!({})).unwrap_err();
        assert!(matches!(err, ViewError::InvalidPath(_)));
    }
}
