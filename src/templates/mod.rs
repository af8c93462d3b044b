//! Template-based artifact rendering
//!
//! Uses MiniJinja in strict-undefined mode, so a template that references a
//! field the entity does not have fails instead of rendering blanks.
//! Templates are addressed by path-like keys (`backend/handler`) and are
//! embedded by default, with optional override via a template directory
//! holding `<key>.jinja` files.

pub mod filters;

use crate::artifacts::LayerMode;
use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::path::{Path, PathBuf};

// Embedded templates (compiled into binary)
mod embedded {
    pub const BACKEND_API: &str = include_str!("../../templates/backend/api.jinja");
    pub const BACKEND_HANDLER: &str = include_str!("../../templates/backend/handler.jinja");
    pub const BACKEND_SERVICE: &str = include_str!("../../templates/backend/service.jinja");
    pub const BACKEND_ROUTER: &str = include_str!("../../templates/backend/router.jinja");
    pub const BACKEND_TEST: &str = include_str!("../../templates/backend/test.jinja");
    pub const FRONTEND_API: &str = include_str!("../../templates/frontend/api.jinja");
    pub const FRONTEND_TYPES: &str = include_str!("../../templates/frontend/types.jinja");
    pub const FRONTEND_INDEX: &str = include_str!("../../templates/frontend/index.jinja");
    pub const FRONTEND_EDIT: &str = include_str!("../../templates/frontend/edit.jinja");
    pub const SQL_MENU: &str = include_str!("../../templates/sql/menu.jinja");

    pub fn lookup(key: &str) -> Option<&'static str> {
        Some(match key {
            "backend/api" => BACKEND_API,
            "backend/handler" => BACKEND_HANDLER,
            "backend/service" => BACKEND_SERVICE,
            "backend/router" => BACKEND_ROUTER,
            "backend/test" => BACKEND_TEST,
            "frontend/api" => FRONTEND_API,
            "frontend/types" => FRONTEND_TYPES,
            "frontend/index" => FRONTEND_INDEX,
            "frontend/edit" => FRONTEND_EDIT,
            "sql/menu" => SQL_MENU,
            _ => return None,
        })
    }
}

/// Keys of the templates compiled into the binary
pub const EMBEDDED_TEMPLATES: &[&str] = &[
    "backend/api",
    "backend/handler",
    "backend/service",
    "backend/router",
    "backend/test",
    "frontend/api",
    "frontend/types",
    "frontend/index",
    "frontend/edit",
    "sql/menu",
];

/// Extension of override files in a template directory
pub const TEMPLATE_EXTENSION: &str = "jinja";

/// Rendered text plus where it would have been written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub template: String,
    pub path: PathBuf,
    pub content: String,
}

/// Renders artifact templates against an [`EntityDescriptor`]
pub struct Renderer {
    env: Environment<'static>,
    template_dir: Option<PathBuf>,
}

impl Renderer {
    /// Embedded templates only, default helper settings.
    pub fn embedded() -> Self {
        Self::new(None, filters::FieldFilters::default())
    }

    pub fn new(template_dir: Option<PathBuf>, field_filters: filters::FieldFilters) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        filters::register(&mut env, field_filters);
        env.add_global("layer_mode", LayerMode::default().as_str());

        let dir = template_dir.clone();
        env.set_loader(move |name| load_template(dir.as_deref(), name));

        Self { env, template_dir }
    }

    /// Backend layering the templates should assume (`layer_mode` global).
    pub fn with_layer_mode(mut self, mode: LayerMode) -> Self {
        self.env.add_global("layer_mode", mode.as_str());
        self
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    /// Render one template to text.
    pub fn render(&self, key: &str, entity: &EntityDescriptor) -> Result<String> {
        let template = self.env.get_template(key).map_err(|e| map_error(key, e))?;
        let text = template.render(entity).map_err(|e| map_error(key, e))?;
        tracing::debug!(template = key, entity = %entity.entity_name, bytes = text.len(), "rendered template");
        Ok(text)
    }

    /// Render and write to `dest`, creating parent directories and replacing
    /// any existing file. Returns exactly the text written.
    pub fn render_to_file(&self, key: &str, entity: &EntityDescriptor, dest: &Path) -> Result<String> {
        let text = self.render(key, entity)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &text)?;
        tracing::info!(template = key, path = %dest.display(), "wrote artifact");
        Ok(text)
    }

    /// Identical render without touching the filesystem.
    pub fn preview(&self, key: &str, entity: &EntityDescriptor, dest: &Path) -> Result<Preview> {
        Ok(Preview {
            template: key.to_string(),
            path: dest.to_path_buf(),
            content: self.render(key, entity)?,
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::embedded()
    }
}

fn load_template(dir: Option<&Path>, name: &str) -> std::result::Result<Option<String>, minijinja::Error> {
    if name.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Ok(None);
    }
    if let Some(dir) = dir {
        let path = dir.join(format!("{}.{}", name, TEMPLATE_EXTENSION));
        if path.is_file() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("failed to read {}", path.display()),
                )
                .with_source(e)
            });
        }
    }
    Ok(embedded::lookup(name).map(str::to_string))
}

fn map_error(key: &str, err: minijinja::Error) -> Error {
    match err.kind() {
        ErrorKind::TemplateNotFound => Error::TemplateNotFound(key.to_string()),
        ErrorKind::SyntaxError => Error::TemplateSyntax {
            template: key.to_string(),
            message: err.to_string(),
        },
        _ => Error::Render {
            template: key.to_string(),
            message: err.to_string(),
        },
    }
}
