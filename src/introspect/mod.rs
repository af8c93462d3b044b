//! Schema introspection
//!
//! Drivers implement [`CatalogSource`] and hand back raw catalog rows in
//! information_schema shape. [`Introspector`] owns everything after that:
//! ordinal ordering, length/scale resolution, type mapping, index grouping,
//! the auto-increment invariant, and classification. A descriptor is only
//! returned once every step succeeded, so a timeout or failure never leaks a
//! partial table to later stages.

pub mod snapshot;
pub mod sqlite;
pub mod types;

use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::naming;
use crate::schema::{ColumnDescriptor, FormKind, IndexDescriptor, QueryOp, TableDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Catalog driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Sqlite,
    Snapshot,
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DriverKind::Sqlite),
            "snapshot" => Ok(DriverKind::Snapshot),
            "mysql" | "postgres" | "postgresql" | "pgsql" => Err(Error::Connection(format!(
                "driver '{}' is not available in this build",
                s
            ))),
            other => Err(Error::Connection(format!("unknown driver '{}'", other))),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Sqlite => write!(f, "sqlite"),
            DriverKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Driver kind plus driver-specific connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub driver: DriverKind,
    pub connection: String,
}

const DRIVER_PREFIXES: &[&str] = &[
    "sqlite", "sqlite3", "snapshot", "mysql", "postgres", "postgresql", "pgsql",
];

impl ConnectionDescriptor {
    pub fn new(driver: DriverKind, connection: impl Into<String>) -> Self {
        Self {
            driver,
            connection: connection.into(),
        }
    }

    /// Parse `driver:connection`. Strings without a recognised driver
    /// prefix are treated as sqlite paths.
    pub fn parse(dsn: &str) -> Result<Self> {
        if let Some((prefix, rest)) = dsn.split_once(':') {
            if DRIVER_PREFIXES.contains(&prefix.to_ascii_lowercase().as_str()) {
                let driver = prefix.parse()?;
                return Ok(Self::new(driver, rest.trim_start_matches("//")));
            }
        }
        Ok(Self::new(DriverKind::Sqlite, dsn))
    }

    /// Open the catalog source for this descriptor.
    pub fn open(&self) -> Result<Box<dyn CatalogSource>> {
        match self.driver {
            DriverKind::Sqlite => Ok(Box::new(sqlite::SqliteCatalog::open(&self.connection)?)),
            DriverKind::Snapshot => Ok(Box::new(snapshot::SnapshotCatalog::load(&self.connection)?)),
        }
    }
}

/// Table name plus comment, for table selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

/// One column row as a catalog reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogColumn {
    pub name: String,
    /// Full declared type, e.g. `decimal(10,2)`
    pub column_type: String,
    pub comment: String,
    pub max_length: Option<u32>,
    pub numeric_precision: Option<u32>,
    pub numeric_scale: Option<u32>,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub primary: bool,
    pub auto_increment: bool,
    pub ordinal: u32,
}

/// One (index, column) row; rows of the same index arrive in sequence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndexRow {
    pub index: String,
    pub column: String,
    #[serde(default)]
    pub non_unique: bool,
}

/// Everything a driver read for one table
#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    pub comment: Option<String>,
    pub columns: Vec<CatalogColumn>,
    pub index_rows: Vec<CatalogIndexRow>,
}

/// Read access to a data source's catalog
pub trait CatalogSource {
    fn driver(&self) -> DriverKind;

    fn list_tables(&self, deadline: Option<Instant>) -> Result<Vec<TableSummary>>;

    /// Raw rows for one table. An absent table yields zero columns.
    fn read_table(&self, table: &str, deadline: Option<Instant>) -> Result<CatalogTable>;
}

/// Fail with [`Error::Timeout`] once the deadline has passed.
pub fn check_deadline(table: &str, deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(Error::Timeout(table.to_string())),
        _ => Ok(()),
    }
}

/// Turns raw catalog rows into classified [`TableDescriptor`]s
#[derive(Debug, Clone, Default)]
pub struct Introspector {
    classifier: Classifier,
}

impl Introspector {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Read, normalize and classify one table.
    pub fn introspect(
        &self,
        source: &dyn CatalogSource,
        table: &str,
        deadline: Option<Instant>,
    ) -> Result<TableDescriptor> {
        check_deadline(table, deadline)?;
        let raw = source.read_table(table, deadline)?;
        check_deadline(table, deadline)?;
        tracing::debug!(
            driver = %source.driver(),
            table,
            columns = raw.columns.len(),
            index_rows = raw.index_rows.len(),
            "read catalog rows"
        );

        let mut descriptor = normalize(table, raw)?;
        self.classifier.classify(&mut descriptor);
        Ok(descriptor)
    }
}

/// Build an unclassified descriptor from raw rows.
pub fn normalize(table: &str, raw: CatalogTable) -> Result<TableDescriptor> {
    if raw.columns.is_empty() {
        return Err(Error::TableNotFound(table.to_string()));
    }

    let mut rows = raw.columns;
    rows.sort_by_key(|c| c.ordinal);

    let mut primary_key = String::new();
    let mut auto_increment_seen = false;
    let mut columns = Vec::with_capacity(rows.len());

    for row in rows {
        let mut column = normalize_column(row);
        if column.is_primary && primary_key.is_empty() {
            primary_key = column.name.clone();
        }
        // Only one auto-increment column, and only on the primary key.
        if column.is_auto_increment && (!column.is_primary || auto_increment_seen) {
            tracing::debug!(table, column = %column.name, "dropping auto-increment flag");
            column.is_auto_increment = false;
        }
        auto_increment_seen |= column.is_auto_increment;
        columns.push(column);
    }

    Ok(TableDescriptor {
        name: table.to_string(),
        comment: raw.comment.unwrap_or_default(),
        columns,
        indexes: group_indexes(raw.index_rows),
        primary_key,
        is_tree_shaped: false,
    })
}

fn normalize_column(row: CatalogColumn) -> ColumnDescriptor {
    let precision = row.numeric_precision.unwrap_or(0);
    let mut length = row.max_length.filter(|l| *l > 0).unwrap_or(precision);
    let mut scale = row.numeric_scale.unwrap_or(0);

    // The declared type is the more specific source for display sizes.
    if let Some((declared_length, declared_scale)) = types::type_modifiers(&row.column_type) {
        length = declared_length;
        if let Some(s) = declared_scale {
            scale = s;
        }
    }

    let mapping = types::map_type(&row.column_type);

    ColumnDescriptor {
        name_camel: naming::to_camel(&row.name),
        name_pascal: naming::to_pascal(&row.name),
        name: row.name,
        raw_type: row.column_type,
        category: mapping.category,
        server_type: mapping.server_type.to_string(),
        client_type: mapping.client_type.to_string(),
        comment: row.comment,
        length,
        precision,
        scale,
        nullable: row.nullable,
        default_value: row.default_value,
        is_primary: row.primary,
        is_auto_increment: row.auto_increment,
        is_list: true,
        is_query: false,
        query_op: QueryOp::Eq,
        form: FormKind::Input,
        dict_type: None,
        ordinal: row.ordinal,
    }
}

/// Group index rows by name, keeping first-seen index order.
pub fn group_indexes(rows: Vec<CatalogIndexRow>) -> Vec<IndexDescriptor> {
    let mut indexes: Vec<IndexDescriptor> = Vec::new();
    for row in rows {
        match indexes.iter_mut().find(|i| i.name == row.index) {
            Some(index) => index.columns.push(row.column),
            None => indexes.push(IndexDescriptor {
                name: row.index,
                columns: vec![row.column],
                unique: !row.non_unique,
            }),
        }
    }
    indexes
}
