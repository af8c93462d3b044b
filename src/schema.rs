//! Normalized table model produced by introspection
//!
//! A [`TableDescriptor`] is built once per generation request and is not
//! re-derived afterwards. Classification fills in the UI/behaviour flags and
//! explicit overrides may then adjust them.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one relational table's structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    /// Ordered by catalog ordinal position
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Empty when the table has no primary key
    #[serde(default)]
    pub primary_key: String,
    #[serde(default)]
    pub is_tree_shaped: bool,
}

/// One column of a [`TableDescriptor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    pub name_camel: String,
    pub name_pascal: String,
    /// Declared type as the catalog reports it, e.g. `varchar(50)`
    pub raw_type: String,
    pub category: TypeCategory,
    /// Server-side type used by backend artifacts
    pub server_type: String,
    /// Client-side type used by typed bindings
    pub client_type: String,
    #[serde(default)]
    pub comment: String,
    pub length: u32,
    pub precision: u32,
    pub scale: u32,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary: bool,
    pub is_auto_increment: bool,
    pub is_list: bool,
    pub is_query: bool,
    pub query_op: QueryOp,
    pub form: FormKind,
    /// Dictionary key for option-backed inputs; only set by overrides
    pub dict_type: Option<String>,
    pub ordinal: u32,
}

/// One index of a [`TableDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Semantic type family inferred from the declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Integer,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
    Json,
}

/// Comparison used when a column is a query condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryOp {
    #[default]
    Eq,
    Like,
    Between,
    In,
}

impl QueryOp {
    /// SQL-ish operator text for templates
    pub fn symbol(self) -> &'static str {
        match self {
            QueryOp::Eq => "=",
            QueryOp::Like => "LIKE",
            QueryOp::Between => "BETWEEN",
            QueryOp::In => "IN",
        }
    }
}

/// UI input kind used by view templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    #[default]
    Input,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    Datetime,
    Switch,
    Upload,
}

/// Explicit per-column adjustment applied after classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ColumnOverride {
    pub list: Option<bool>,
    pub query: Option<bool>,
    pub query_op: Option<QueryOp>,
    pub form: Option<FormKind>,
    pub dict_type: Option<String>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Exact-name presence check
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The single auto-increment column, if any
    pub fn auto_increment_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_auto_increment)
    }

    /// Apply user overrides keyed by column name.
    ///
    /// Derived flags are not recomputed afterwards. Turning query eligibility
    /// on without an operator resets the operator to equality.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, ColumnOverride>) -> Result<()> {
        for (name, ov) in overrides {
            let column = self
                .columns
                .iter_mut()
                .find(|c| &c.name == name)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "override for unknown column '{}' on table '{}'",
                        name, self.name
                    ))
                })?;

            if let Some(list) = ov.list {
                column.is_list = list;
            }
            if let Some(query) = ov.query {
                if query && !column.is_query {
                    column.query_op = QueryOp::Eq;
                }
                column.is_query = query;
            }
            if let Some(op) = ov.query_op {
                column.query_op = op;
            }
            if let Some(form) = ov.form {
                column.form = form;
            }
            if let Some(dict) = &ov.dict_type {
                column.dict_type = Some(dict.clone());
            }
            tracing::debug!(table = %self.name, column = %name, "applied column override");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::naming;

    /// Bare column with neutral flags; tests adjust what they need.
    pub fn column(name: &str, raw_type: &str, category: TypeCategory) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            name_camel: naming::to_camel(name),
            name_pascal: naming::to_pascal(name),
            raw_type: raw_type.to_string(),
            category,
            server_type: "String".to_string(),
            client_type: "string".to_string(),
            comment: String::new(),
            length: 0,
            precision: 0,
            scale: 0,
            nullable: true,
            default_value: None,
            is_primary: false,
            is_auto_increment: false,
            is_list: true,
            is_query: false,
            query_op: QueryOp::Eq,
            form: FormKind::Input,
            dict_type: None,
            ordinal: 0,
        }
    }

    /// `sys_user(id PK auto-inc, user_name, status, deleted_at)`
    pub fn sys_user() -> TableDescriptor {
        let mut id = column("id", "int", TypeCategory::Integer);
        id.is_primary = true;
        id.is_auto_increment = true;
        id.nullable = false;
        id.server_type = "i32".to_string();
        id.client_type = "number".to_string();
        let mut user_name = column("user_name", "varchar(50)", TypeCategory::Text);
        user_name.length = 50;
        user_name.ordinal = 1;
        let mut status = column("status", "tinyint", TypeCategory::Integer);
        status.ordinal = 2;
        status.is_query = true;
        status.form = FormKind::Switch;
        let mut deleted_at = column("deleted_at", "datetime", TypeCategory::Temporal);
        deleted_at.ordinal = 3;
        deleted_at.is_list = false;
        deleted_at.server_type = "chrono::NaiveDateTime".to_string();
        TableDescriptor {
            name: "sys_user".to_string(),
            comment: "User".to_string(),
            columns: vec![id, user_name, status, deleted_at],
            indexes: vec![],
            primary_key: "id".to_string(),
            is_tree_shaped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_toggle_flags() {
        let mut table = fixtures::sys_user();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "user_name".to_string(),
            ColumnOverride {
                query: Some(true),
                query_op: Some(QueryOp::Like),
                ..Default::default()
            },
        );
        overrides.insert(
            "status".to_string(),
            ColumnOverride {
                list: Some(false),
                dict_type: Some("sys_status".into()),
                ..Default::default()
            },
        );
        table.apply_overrides(&overrides).unwrap();

        let user_name = table.column("user_name").unwrap();
        assert!(user_name.is_query);
        assert_eq!(user_name.query_op, QueryOp::Like);
        let status = table.column("status").unwrap();
        assert!(!status.is_list);
        assert_eq!(status.dict_type.as_deref(), Some("sys_status"));
    }

    #[test]
    fn test_enabling_query_resets_operator() {
        let mut table = fixtures::sys_user();
        table.columns[1].query_op = QueryOp::In;
        let overrides =
            BTreeMap::from([("user_name".to_string(), ColumnOverride { query: Some(true), ..Default::default() })]);
        table.apply_overrides(&overrides).unwrap();
        assert_eq!(table.columns[1].query_op, QueryOp::Eq);
    }

    #[test]
    fn test_override_unknown_column_fails() {
        let mut table = fixtures::sys_user();
        let overrides = BTreeMap::from([("nope".to_string(), ColumnOverride::default())]);
        assert!(matches!(table.apply_overrides(&overrides), Err(Error::Config(_))));
    }

    #[test]
    fn test_query_op_symbols() {
        assert_eq!(QueryOp::Eq.symbol(), "=");
        assert_eq!(QueryOp::Between.symbol(), "BETWEEN");
    }
}
