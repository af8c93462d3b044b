//! Which artifacts a generation run produces and where they land
//!
//! An [`ArtifactPlan`] is an ordered list of `(kind, template key, destination
//! pattern)` entries. Patterns are relative to the backend output root, or to
//! the frontend root for frontend artifacts, and may use `{module}`,
//! `{entity_snake}`, `{entity_kebab}` and `{entity_camel}`.

use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Artifact family, recorded with every generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Backend,
    Frontend,
    Provisioning,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Backend => "backend",
            ArtifactKind::Frontend => "frontend",
            ArtifactKind::Provisioning => "provisioning",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend layering; `standard` adds a separate service layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LayerMode {
    Simple,
    #[default]
    Standard,
}

impl LayerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerMode::Simple => "simple",
            LayerMode::Standard => "standard",
        }
    }
}

impl FromStr for LayerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(LayerMode::Simple),
            "standard" => Ok(LayerMode::Standard),
            other => Err(Error::Config(format!(
                "unknown layer mode '{}' (expected simple or standard)",
                other
            ))),
        }
    }
}

/// Which halves of the plan to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    /// Backend and provisioning artifacts
    BackendOnly,
    FrontendOnly,
}

impl Selection {
    fn includes(self, kind: ArtifactKind) -> bool {
        match self {
            Selection::All => true,
            Selection::BackendOnly => kind != ArtifactKind::Frontend,
            Selection::FrontendOnly => kind == ArtifactKind::Frontend,
        }
    }
}

/// One plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    /// Template key, e.g. `backend/handler`
    pub template: String,
    /// Destination pattern relative to the output root
    pub path: String,
}

impl ArtifactSpec {
    pub fn new(kind: ArtifactKind, template: &str, path: &str) -> Self {
        Self {
            kind,
            template: template.to_string(),
            path: path.to_string(),
        }
    }
}

/// A plan entry resolved against one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub kind: ArtifactKind,
    pub template: String,
    pub path: PathBuf,
}

/// Output roots the plan resolves against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRoots {
    pub backend: PathBuf,
    pub frontend: PathBuf,
}

impl OutputRoots {
    fn for_kind(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Frontend => &self.frontend,
            ArtifactKind::Backend | ArtifactKind::Provisioning => &self.backend,
        }
    }
}

/// Ordered artifact list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    entries: Vec<ArtifactSpec>,
}

impl ArtifactPlan {
    pub fn new(entries: Vec<ArtifactSpec>) -> Self {
        Self { entries }
    }

    /// The shipped plan. The service layer only exists in standard mode and
    /// backend tests only when requested.
    pub fn standard(layer_mode: LayerMode, with_test: bool) -> Self {
        use ArtifactKind::*;

        let mut entries = vec![
            ArtifactSpec::new(Backend, "backend/api", "src/{module}/{entity_snake}/api.rs"),
            ArtifactSpec::new(Backend, "backend/handler", "src/{module}/{entity_snake}/handler.rs"),
        ];
        if layer_mode == LayerMode::Standard {
            entries.push(ArtifactSpec::new(
                Backend,
                "backend/service",
                "src/{module}/{entity_snake}/service.rs",
            ));
        }
        entries.push(ArtifactSpec::new(
            Backend,
            "backend/router",
            "src/{module}/{entity_snake}/router.rs",
        ));
        if with_test {
            entries.push(ArtifactSpec::new(
                Backend,
                "backend/test",
                "tests/{module}/{entity_snake}_test.rs",
            ));
        }
        entries.extend([
            ArtifactSpec::new(
                Provisioning,
                "sql/menu",
                "storage/data/generate/{entity_snake}_menu.sql",
            ),
            ArtifactSpec::new(Frontend, "frontend/api", "api/{module}/{entity_kebab}/index.ts"),
            ArtifactSpec::new(Frontend, "frontend/types", "api/{module}/{entity_kebab}/types.ts"),
            ArtifactSpec::new(Frontend, "frontend/index", "views/{module}/{entity_kebab}/index.vue"),
            ArtifactSpec::new(Frontend, "frontend/edit", "views/{module}/{entity_kebab}/edit.vue"),
        ]);
        Self { entries }
    }

    pub fn entries(&self) -> &[ArtifactSpec] {
        &self.entries
    }

    /// Keep only the entries the selection covers.
    pub fn select(mut self, selection: Selection) -> Self {
        self.entries.retain(|e| selection.includes(e.kind));
        self
    }

    /// Expand every pattern for `entity`, in plan order.
    ///
    /// Two entries landing on the same destination is a configuration error.
    pub fn resolve(&self, entity: &EntityDescriptor, roots: &OutputRoots) -> Result<Vec<PlannedArtifact>> {
        let mut seen: HashMap<PathBuf, &str> = HashMap::new();
        let mut planned = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let path = roots.for_kind(e.kind).join(expand_pattern(&e.path, entity));
            if let Some(first) = seen.insert(path.clone(), e.template.as_str()) {
                return Err(Error::Config(format!(
                    "templates '{}' and '{}' both write {}",
                    first,
                    e.template,
                    path.display()
                )));
            }
            planned.push(PlannedArtifact {
                kind: e.kind,
                template: e.template.clone(),
                path,
            });
        }
        Ok(planned)
    }
}

impl Default for ArtifactPlan {
    fn default() -> Self {
        Self::standard(LayerMode::default(), false)
    }
}

/// Substitute entity placeholders in a destination pattern.
pub fn expand_pattern(pattern: &str, entity: &EntityDescriptor) -> String {
    pattern
        .replace("{module}", &entity.module)
        .replace("{entity_snake}", &entity.entity_snake)
        .replace("{entity_kebab}", &entity.entity_kebab)
        .replace("{entity_camel}", &entity.entity_camel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBuilder;
    use crate::schema::fixtures::sys_user;

    fn templates(plan: &ArtifactPlan) -> Vec<&str> {
        plan.entries().iter().map(|e| e.template.as_str()).collect()
    }

    #[test]
    fn test_standard_plan_layers() {
        let plan = ArtifactPlan::standard(LayerMode::Standard, true);
        assert_eq!(
            templates(&plan),
            [
                "backend/api",
                "backend/handler",
                "backend/service",
                "backend/router",
                "backend/test",
                "sql/menu",
                "frontend/api",
                "frontend/types",
                "frontend/index",
                "frontend/edit",
            ]
        );

        let simple = ArtifactPlan::standard(LayerMode::Simple, false);
        assert!(!templates(&simple).contains(&"backend/service"));
        assert!(!templates(&simple).contains(&"backend/test"));
        assert_eq!(simple.entries().len(), 8);
    }

    #[test]
    fn test_selection() {
        let backend = ArtifactPlan::default().select(Selection::BackendOnly);
        assert!(backend.entries().iter().all(|e| e.kind != ArtifactKind::Frontend));
        assert!(backend.entries().iter().any(|e| e.kind == ArtifactKind::Provisioning));

        let frontend = ArtifactPlan::default().select(Selection::FrontendOnly);
        assert_eq!(frontend.entries().len(), 4);
    }

    #[test]
    fn test_resolve_paths() {
        let mut table = sys_user();
        table.name = "sys_user_role".to_string();
        let entity = EntityBuilder::default().build(table, "sys", &["list"]).unwrap();
        let roots = OutputRoots {
            backend: PathBuf::from("/srv/server"),
            frontend: PathBuf::from("/srv/web"),
        };
        let planned = ArtifactPlan::default().resolve(&entity, &roots).unwrap();

        assert_eq!(planned[0].path, PathBuf::from("/srv/server/src/sys/user_role/api.rs"));
        let menu = planned.iter().find(|p| p.template == "sql/menu").unwrap();
        assert_eq!(
            menu.path,
            PathBuf::from("/srv/server/storage/data/generate/user_role_menu.sql")
        );
        let view = planned.iter().find(|p| p.template == "frontend/index").unwrap();
        assert_eq!(view.path, PathBuf::from("/srv/web/views/sys/user-role/index.vue"));
    }

    #[test]
    fn test_resolve_rejects_colliding_destinations() {
        let entity = EntityBuilder::default().build(sys_user(), "sys", &["list"]).unwrap();
        let roots = OutputRoots {
            backend: PathBuf::from("/srv"),
            frontend: PathBuf::from("/srv"),
        };
        let plan = ArtifactPlan::new(vec![
            ArtifactSpec::new(ArtifactKind::Backend, "backend/api", "{module}/{entity_snake}.txt"),
            ArtifactSpec::new(ArtifactKind::Frontend, "frontend/api", "{module}/{entity_kebab}.txt"),
        ]);
        let err = plan.resolve(&entity, &roots).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("/srv/sys/user.txt")));
    }

    #[test]
    fn test_expand_camel() {
        let mut table = sys_user();
        table.name = "sys_user_role".to_string();
        let entity = EntityBuilder::default().build(table, "sys", &["list"]).unwrap();
        assert_eq!(expand_pattern("{entity_camel}.ts", &entity), "userRole.ts");
    }

    #[test]
    fn test_layer_mode_parse() {
        assert_eq!("Simple".parse::<LayerMode>().unwrap(), LayerMode::Simple);
        assert!(matches!("layered".parse::<LayerMode>(), Err(Error::Config(_))));
    }
}
