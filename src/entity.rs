//! Render-ready entity descriptors
//!
//! An [`EntityDescriptor`] joins a classified table with a module name and a
//! feature selection. The operation list is a pure function of the feature
//! set and the entity name: same inputs, same operations, same paths.

use crate::error::{Error, Result};
use crate::naming;
use crate::schema::TableDescriptor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Generated capability. Declaration order is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    List,
    Add,
    Edit,
    Delete,
    View,
    Export,
    Import,
    BatchDelete,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::List,
        Feature::Add,
        Feature::Edit,
        Feature::Delete,
        Feature::View,
        Feature::Export,
        Feature::Import,
        Feature::BatchDelete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::List => "list",
            Feature::Add => "add",
            Feature::Edit => "edit",
            Feature::Delete => "delete",
            Feature::View => "view",
            Feature::Export => "export",
            Feature::Import => "import",
            Feature::BatchDelete => "batch-delete",
        }
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = naming::to_kebab(s.trim());
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| Error::UnknownFeature(s.trim().to_string()))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a feature list, deduplicating and skipping blanks.
///
/// An empty selection means `{list}`, never "everything".
pub fn resolve_features<S: AsRef<str>>(requested: &[S]) -> Result<BTreeSet<Feature>> {
    let mut set = BTreeSet::new();
    for item in requested {
        let item = item.as_ref().trim();
        if item.is_empty() {
            continue;
        }
        set.insert(item.parse()?);
    }
    if set.is_empty() {
        set.insert(Feature::List);
    }
    Ok(set)
}

/// Operation kinds, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum OperationKind {
    List,
    Add,
    Edit,
    Delete,
    View,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::List,
        OperationKind::Add,
        OperationKind::Edit,
        OperationKind::Delete,
        OperationKind::View,
    ];

    pub fn feature(self) -> Feature {
        match self {
            OperationKind::List => Feature::List,
            OperationKind::Add => Feature::Add,
            OperationKind::Edit => Feature::Edit,
            OperationKind::Delete => Feature::Delete,
            OperationKind::View => Feature::View,
        }
    }

    pub fn verb(self) -> &'static str {
        self.feature().as_str()
    }

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::List => "List",
            OperationKind::Add => "Add",
            OperationKind::Edit => "Edit",
            OperationKind::Delete => "Delete",
            OperationKind::View => "View",
        }
    }

    /// Reads use GET, mutations POST.
    pub fn method(self) -> HttpMethod {
        match self {
            OperationKind::List | OperationKind::View => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    fn caption(self, subject: &str) -> String {
        match self {
            OperationKind::List => format!("List {}", subject),
            OperationKind::Add => format!("Add {}", subject),
            OperationKind::Edit => format!("Edit {}", subject),
            OperationKind::Delete => format!("Delete {}", subject),
            OperationKind::View => format!("View {} details", subject),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
}

/// One generated capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    /// Handler name, e.g. `List`
    pub name: String,
    pub verb: String,
    pub caption: String,
    /// `/{module}/{entity-kebab}/{verb}`
    pub path: String,
    pub method: HttpMethod,
    pub tag: String,
}

/// Table naming rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NamingRules {
    /// Tried in order; at most one is stripped
    pub table_prefixes: Vec<String>,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            table_prefixes: ["sys_", "admin_", "hg_", "t_", "tb_"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl NamingRules {
    /// Strip the first matching prefix, unless that would leave nothing.
    pub fn strip_prefix<'a>(&self, table: &'a str) -> &'a str {
        self.table_prefixes
            .iter()
            .find_map(|p| table.strip_prefix(p.as_str()).filter(|rest| !rest.is_empty()))
            .unwrap_or(table)
    }

    /// `sys_user_role` -> `UserRole`
    pub fn entity_name(&self, table: &str) -> String {
        naming::to_pascal(self.strip_prefix(table))
    }
}

/// Everything a template sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityDescriptor {
    pub module: String,
    pub package: String,
    pub entity_name: String,
    pub entity_camel: String,
    pub entity_kebab: String,
    pub entity_snake: String,
    pub table: TableDescriptor,
    pub features: BTreeSet<Feature>,
    /// Every known feature mapped to whether it is enabled
    pub feature_flags: BTreeMap<String, bool>,
    pub operations: Vec<OperationDescriptor>,
    pub has_soft_delete: bool,
    pub has_created_at: bool,
    pub has_updated_at: bool,
    pub has_tree: bool,
}

impl EntityDescriptor {
    pub fn operation(&self, kind: OperationKind) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|o| o.kind == kind)
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Builds [`EntityDescriptor`]s
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder {
    naming: NamingRules,
    package: String,
}

impl EntityBuilder {
    pub fn new(naming: NamingRules) -> Self {
        Self {
            naming,
            package: String::new(),
        }
    }

    /// Package/crate path handed to backend templates.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn build<S: AsRef<str>>(
        &self,
        table: TableDescriptor,
        module: &str,
        requested: &[S],
    ) -> Result<EntityDescriptor> {
        let features = resolve_features(requested)?;
        let entity_name = self.naming.entity_name(&table.name);
        let entity_kebab = naming::to_kebab(&entity_name);
        let operations = build_operations(module, &entity_name, &table.comment, &features);

        let feature_flags = Feature::ALL
            .into_iter()
            .map(|f| (f.as_str().to_string(), features.contains(&f)))
            .collect();

        tracing::debug!(
            table = %table.name,
            entity = %entity_name,
            operations = operations.len(),
            "built entity descriptor"
        );

        Ok(EntityDescriptor {
            module: module.to_string(),
            package: self.package.clone(),
            entity_camel: naming::to_camel(&entity_name),
            entity_snake: naming::to_snake(&entity_name),
            entity_kebab,
            entity_name,
            has_soft_delete: table.has_column("deleted_at"),
            has_created_at: table.has_column("created_at"),
            has_updated_at: table.has_column("updated_at"),
            has_tree: table.is_tree_shaped,
            table,
            features,
            feature_flags,
            operations,
        })
    }
}

/// Operations for the verb features present, always in List, Add, Edit,
/// Delete, View order.
pub fn build_operations(
    module: &str,
    entity_name: &str,
    table_comment: &str,
    features: &BTreeSet<Feature>,
) -> Vec<OperationDescriptor> {
    let kebab = naming::to_kebab(entity_name);
    let subject = if table_comment.trim().is_empty() {
        entity_name
    } else {
        table_comment.trim()
    };

    OperationKind::ALL
        .into_iter()
        .filter(|kind| features.contains(&kind.feature()))
        .map(|kind| OperationDescriptor {
            kind,
            name: kind.name().to_string(),
            verb: kind.verb().to_string(),
            caption: kind.caption(subject),
            path: format!("/{}/{}/{}", module, kebab, kind.verb()),
            method: kind.method(),
            tag: module.to_string(),
        })
        .collect()
}
