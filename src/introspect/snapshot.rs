//! Catalog snapshots
//!
//! A snapshot is a YAML (or JSON) dump of catalog rows in information_schema
//! shape. Generating from a snapshot reproduces a run without a live database.
//!
//! ```yaml
//! tables:
//!   - name: sys_user
//!     comment: System users
//!     columns:
//!       - { name: id, column_type: "bigint(20)", primary: true, auto_increment: true, ordinal: 1 }
//!       - { name: user_name, column_type: "varchar(50)", comment: Login name, ordinal: 2 }
//!     indexes:
//!       - { index: PRIMARY, column: id }
//! ```

use super::{
    check_deadline, CatalogColumn, CatalogIndexRow, CatalogSource, CatalogTable, DriverKind,
    TableSummary,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Whole snapshot file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tables: Vec<SnapshotTable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotTable {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub columns: Vec<CatalogColumn>,
    #[serde(default)]
    pub indexes: Vec<CatalogIndexRow>,
}

/// In-memory catalog backed by a [`Snapshot`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    snapshot: Snapshot,
}

impl SnapshotCatalog {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a `.json` or YAML snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Connection(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_norway::from_str(&content)?
        };
        Ok(Self::new(snapshot))
    }
}

impl CatalogSource for SnapshotCatalog {
    fn driver(&self) -> DriverKind {
        DriverKind::Snapshot
    }

    fn list_tables(&self, deadline: Option<Instant>) -> Result<Vec<TableSummary>> {
        check_deadline("*", deadline)?;
        let mut tables: Vec<_> = self
            .snapshot
            .tables
            .iter()
            .map(|t| TableSummary {
                name: t.name.clone(),
                comment: t.comment.clone().unwrap_or_default(),
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    fn read_table(&self, table: &str, deadline: Option<Instant>) -> Result<CatalogTable> {
        check_deadline(table, deadline)?;
        Ok(self
            .snapshot
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| CatalogTable {
                comment: t.comment.clone(),
                columns: t.columns.clone(),
                index_rows: t.indexes.clone(),
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
tables:
  - name: sys_dept
    comment: Departments
    columns:
      - { name: parent_id, column_type: "bigint(20)", ordinal: 2 }
      - { name: id, column_type: "bigint(20)", primary: true, auto_increment: true, ordinal: 1 }
    indexes:
      - { index: PRIMARY, column: id }
  - name: audit_log
    columns:
      - { name: id, column_type: int, ordinal: 1 }
"#;

    #[test]
    fn test_read_snapshot_table() {
        let snapshot: Snapshot = serde_norway::from_str(SNAPSHOT).unwrap();
        let catalog = SnapshotCatalog::new(snapshot);
        let raw = catalog.read_table("sys_dept", None).unwrap();
        assert_eq!(raw.comment.as_deref(), Some("Departments"));
        assert_eq!(raw.columns.len(), 2);
        assert!(raw.columns[1].primary);
        assert_eq!(raw.index_rows.len(), 1);

        assert!(catalog.read_table("missing", None).unwrap().columns.is_empty());
    }

    #[test]
    fn test_list_snapshot_tables_sorted() {
        let snapshot: Snapshot = serde_norway::from_str(SNAPSHOT).unwrap();
        let names: Vec<_> = SnapshotCatalog::new(snapshot)
            .list_tables(None)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["audit_log", "sys_dept"]);
    }

    #[test]
    fn test_load_missing_snapshot_is_connection_error() {
        let err = SnapshotCatalog::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
