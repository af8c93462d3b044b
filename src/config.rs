//! tablegen configuration
//!
//! Loaded from `tablegen.yaml`. Every section is optional; anything left out
//! falls back to the shipped defaults, including the naming prefixes and all
//! classifier cue lists.
//!
//! ```yaml
//! database:
//!   dsn: sqlite:./app.db
//! generator:
//!   backend: { output: ./server, package: app, layer_mode: simple }
//!   frontend: { output: ./web/src }
//!   features: [list, add, edit, delete, view]
//! overrides:
//!   sys_user:
//!     remark: { list: false, form: textarea }
//! ```

use crate::artifacts::{ArtifactPlan, ArtifactSpec, LayerMode, OutputRoots};
use crate::classify::ClassifierRules;
use crate::entity::NamingRules;
use crate::error::{Error, Result};
use crate::history::{ConfigSnapshot, DEFAULT_HISTORY_DIR};
use crate::introspect::ConnectionDescriptor;
use crate::schema::ColumnOverride;
use crate::templates::filters::FieldFilters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "tablegen.yaml";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub generator: GeneratorConfig,
    pub naming: NamingRules,
    pub classifier: ClassifierRules,
    /// table -> column -> override
    pub overrides: BTreeMap<String, BTreeMap<String, ColumnOverride>>,
}

/// Where the catalog comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Explicit driver; when empty the dsn prefix decides
    pub driver: Option<String>,
    /// `sqlite:path`, `snapshot:file.yaml`, or a bare sqlite path
    pub dsn: String,
}

impl DatabaseConfig {
    pub fn connection(&self) -> Result<ConnectionDescriptor> {
        if self.dsn.trim().is_empty() {
            return Err(Error::Config("database.dsn is not set".to_string()));
        }
        match self.driver.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(driver) => Ok(ConnectionDescriptor::new(driver.parse()?, self.dsn.clone())),
            None => ConnectionDescriptor::parse(&self.dsn),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GeneratorConfig {
    pub backend: BackendConfig,
    pub frontend: FrontendConfig,
    /// Requested features; empty means `[list]`
    pub features: Vec<String>,
    /// Directory of `<key>.jinja` overrides
    pub template_dir: Option<PathBuf>,
    pub history_dir: PathBuf,
    /// Replaces the shipped artifact plan when set
    pub artifacts: Option<Vec<ArtifactSpec>>,
    /// Columns never offered as form inputs
    pub form_denylist: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            frontend: FrontendConfig::default(),
            features: ["list", "add", "edit", "delete", "view"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            template_dir: None,
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            artifacts: None,
            form_denylist: FieldFilters::default().form_denylist,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub output: PathBuf,
    pub package: String,
    pub layer_mode: LayerMode,
    pub with_test: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: PathBuf::from("./server"),
            package: "app".to_string(),
            layer_mode: LayerMode::default(),
            with_test: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FrontendConfig {
    pub enabled: bool,
    pub output: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: PathBuf::from("./web/src"),
        }
    }
}

impl Config {
    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_norway::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_norway::to_string(self)?)?;
        Ok(())
    }

    /// Artifact plan for this configuration, before backend/frontend selection.
    pub fn artifact_plan(&self) -> ArtifactPlan {
        match &self.generator.artifacts {
            Some(entries) => ArtifactPlan::new(entries.clone()),
            None => ArtifactPlan::standard(
                self.generator.backend.layer_mode,
                self.generator.backend.with_test,
            ),
        }
    }

    pub fn output_roots(&self) -> OutputRoots {
        OutputRoots {
            backend: self.generator.backend.output.clone(),
            frontend: self.generator.frontend.output.clone(),
        }
    }

    pub fn field_filters(&self) -> FieldFilters {
        FieldFilters {
            form_denylist: self.generator.form_denylist.clone(),
        }
    }

    /// Column overrides for one table; empty if none are configured.
    pub fn overrides_for(&self, table: &str) -> BTreeMap<String, ColumnOverride> {
        self.overrides.get(table).cloned().unwrap_or_default()
    }

    /// What a journal record keeps of this configuration.
    pub fn snapshot(&self, features: &[String]) -> ConfigSnapshot {
        ConfigSnapshot {
            output: self.generator.backend.output.display().to_string(),
            web_output: self.generator.frontend.output.display().to_string(),
            package: self.generator.backend.package.clone(),
            features: features.to_vec(),
            layer_mode: self.generator.backend.layer_mode.as_str().to_string(),
            with_test: self.generator.backend.with_test,
        }
    }
}
