//! Live catalog reads from a SQLite database
//!
//! Columns come from `pragma_table_info`, indexes from `pragma_index_list`
//! joined with `pragma_index_info`. SQLite keeps the original `CREATE TABLE`
//! text, so `--` comments written next to a column (or on the `CREATE TABLE`
//! line) are read back as column and table comments.

use super::{
    check_deadline, CatalogColumn, CatalogIndexRow, CatalogSource, CatalogTable, DriverKind,
    TableSummary,
};
use crate::error::{Error, Result};
use regex::Regex;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

/// Statements executed between deadline checks
const PROGRESS_OPS: i32 = 1_000;

const CONSTRAINT_KEYWORDS: &[&str] = &["PRIMARY", "UNIQUE", "CONSTRAINT", "FOREIGN", "CHECK"];

/// Read-only connection to a SQLite catalog
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open a database file (or `file:` URI) read-only and make sure it is
    /// actually a database.
    pub fn open(path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::Connection(format!("cannot open sqlite database {}: {}", path, e)))?;
        Self::from_connection(conn)
            .map_err(|e| Error::Connection(format!("sqlite database {} unusable: {}", path, e)))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))?;
        Ok(Self { conn })
    }

    fn create_sql(&self, table: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |r| r.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
    }

    fn read_rows(&self, table: &str) -> rusqlite::Result<CatalogTable> {
        let create_sql = self.create_sql(table)?.unwrap_or_default();
        let (table_comment, column_comments) = parse_comments(&create_sql);

        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt
            .query_map(params![table], |r| {
                Ok((
                    r.get::<_, u32>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, bool>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, u32>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let pk_count = rows.iter().filter(|row| row.5 > 0).count();
        let ddl = strip_literals_and_comments(&create_sql);
        // AUTOINCREMENT is only legal on an INTEGER PRIMARY KEY column.
        let declares_autoincrement = autoincrement_re().is_match(&ddl);
        let without_rowid = without_rowid_re().is_match(&ddl);

        let mut pk_columns: Vec<(u32, String)> = Vec::new();
        let mut columns = Vec::with_capacity(rows.len());
        for (cid, name, declared, not_null, default_value, pk) in rows {
            let primary = pk > 0;
            if primary {
                pk_columns.push((pk, name.clone()));
            }
            // A lone INTEGER PRIMARY KEY aliases the rowid and is assigned automatically.
            let rowid_alias = primary
                && pk_count == 1
                && !without_rowid
                && declared.trim().eq_ignore_ascii_case("integer");
            let auto_increment = rowid_alias || (primary && pk_count == 1 && declares_autoincrement);
            columns.push(CatalogColumn {
                comment: column_comments.get(&name).cloned().unwrap_or_default(),
                name,
                column_type: declared,
                max_length: None,
                numeric_precision: None,
                numeric_scale: None,
                // Other primary keys accept NULL unless declared NOT NULL or WITHOUT ROWID.
                nullable: !not_null && !rowid_alias && !(primary && without_rowid),
                default_value,
                primary,
                auto_increment,
                ordinal: cid,
            });
        }

        pk_columns.sort();
        let mut index_rows: Vec<CatalogIndexRow> = pk_columns
            .into_iter()
            .map(|(_, column)| CatalogIndexRow {
                index: "PRIMARY".to_string(),
                column,
                non_unique: false,
            })
            .collect();

        let mut stmt = self.conn.prepare(
            "SELECT il.name, ii.name, il.\"unique\" \
             FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii \
             WHERE il.origin <> 'pk' \
             ORDER BY il.name, ii.seqno",
        )?;
        let secondary = stmt
            .query_map(params![table], |r| {
                Ok(CatalogIndexRow {
                    index: r.get(0)?,
                    column: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    non_unique: !r.get::<_, bool>(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        index_rows.extend(secondary);

        Ok(CatalogTable {
            comment: table_comment,
            columns,
            index_rows,
        })
    }
}

/// Clears the progress handler when dropped.
struct DeadlineGuard<'a> {
    conn: &'a Connection,
}

impl<'a> DeadlineGuard<'a> {
    fn install(conn: &'a Connection, deadline: Option<Instant>) -> Self {
        if let Some(deadline) = deadline {
            conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        }
        Self { conn }
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn map_query_error(table: &str, err: rusqlite::Error) -> Error {
    if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
        Error::Timeout(table.to_string())
    } else {
        Error::Database(err)
    }
}

impl CatalogSource for SqliteCatalog {
    fn driver(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn list_tables(&self, deadline: Option<Instant>) -> Result<Vec<TableSummary>> {
        check_deadline("*", deadline)?;
        let _guard = DeadlineGuard::install(&self.conn, deadline);
        let read = || -> rusqlite::Result<Vec<TableSummary>> {
            let mut stmt = self.conn.prepare(
                "SELECT name, sql FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let rows = stmt.query_map([], |r| {
                let name: String = r.get(0)?;
                let sql: Option<String> = r.get(1)?;
                let comment = sql.and_then(|s| parse_comments(&s).0).unwrap_or_default();
                Ok(TableSummary { name, comment })
            })?;
            let tables = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tables)
        };
        read().map_err(|e| map_query_error("*", e))
    }

    fn read_table(&self, table: &str, deadline: Option<Instant>) -> Result<CatalogTable> {
        let _guard = DeadlineGuard::install(&self.conn, deadline);
        self.read_rows(table).map_err(|e| map_query_error(table, e))
    }
}

fn autoincrement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bPRIMARY\s+KEY\b[^,]*\bAUTOINCREMENT\b").expect("autoincrement pattern is valid")
    })
}

fn without_rowid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\)\s*WITHOUT\s+ROWID\b").expect("without rowid pattern is valid"))
}

/// `CREATE TABLE` text with comments, string literals and quoted identifiers
/// blanked out, so keyword matches only see SQL structure.
fn strip_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                while let Some(next) = chars.next() {
                    if next == close {
                        // Doubled quote is an escaped quote inside the literal.
                        if close != ']' && chars.peek() == Some(&close) {
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
                out.push('_');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Extract the table comment and per-column comments from `CREATE TABLE` text.
pub fn parse_comments(create_sql: &str) -> (Option<String>, HashMap<String, String>) {
    let mut table_comment = None;
    let mut columns = HashMap::new();

    for line in create_sql.lines() {
        let Some((definition, comment)) = line.split_once("--") else {
            continue;
        };
        let comment = comment.trim();
        let definition = definition.trim();
        if comment.is_empty() || definition.is_empty() {
            continue;
        }
        if definition.to_ascii_uppercase().starts_with("CREATE") {
            table_comment = Some(comment.to_string());
            continue;
        }
        let Some(token) = definition.split_whitespace().next() else {
            continue;
        };
        let name = token.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']' | ',' | '('));
        if name.is_empty() || CONSTRAINT_KEYWORDS.contains(&name.to_ascii_uppercase().as_str()) {
            continue;
        }
        columns.insert(name.to_string(), comment.to_string());
    }

    (table_comment, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_DDL: &str = "CREATE TABLE sys_user ( -- System users
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name VARCHAR(50) NOT NULL, -- Login name
    \"status\" TINYINT DEFAULT 1, -- Account status
    deleted_at DATETIME,
    UNIQUE (user_name) -- one login per user
)";

    fn catalog() -> SqliteCatalog {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(USER_DDL).unwrap();
        conn.execute_batch("CREATE INDEX idx_status_deleted ON sys_user (status, deleted_at);")
            .unwrap();
        SqliteCatalog::from_connection(conn).unwrap()
    }

    #[test]
    fn test_parse_comments() {
        let (table, columns) = parse_comments(USER_DDL);
        assert_eq!(table.as_deref(), Some("System users"));
        assert_eq!(columns.get("user_name").map(String::as_str), Some("Login name"));
        assert_eq!(columns.get("status").map(String::as_str), Some("Account status"));
        assert!(!columns.contains_key("UNIQUE"));
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_read_table_rows() {
        let raw = catalog().read_table("sys_user", None).unwrap();
        assert_eq!(raw.comment.as_deref(), Some("System users"));
        assert_eq!(raw.columns.len(), 4);

        let id = &raw.columns[0];
        assert!(id.primary && id.auto_increment && !id.nullable);
        let user_name = &raw.columns[1];
        assert_eq!(user_name.column_type, "VARCHAR(50)");
        assert!(!user_name.nullable);
        assert_eq!(raw.columns[2].default_value.as_deref(), Some("1"));

        assert_eq!(raw.index_rows[0].index, "PRIMARY");
        let composite: Vec<_> = raw
            .index_rows
            .iter()
            .filter(|r| r.index == "idx_status_deleted")
            .map(|r| r.column.as_str())
            .collect();
        assert_eq!(composite, ["status", "deleted_at"]);
        assert!(raw
            .index_rows
            .iter()
            .any(|r| r.index.starts_with("sqlite_autoindex") && !r.non_unique));
    }

    #[test]
    fn test_missing_table_has_no_columns() {
        let raw = catalog().read_table("nope", None).unwrap();
        assert!(raw.columns.is_empty());
    }

    #[test]
    fn test_list_tables() {
        let tables = catalog().list_tables(None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "sys_user");
        assert_eq!(tables[0].comment, "System users");
    }

    #[test]
    fn test_open_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let err = SqliteCatalog::open(path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_non_integer_primary_key_is_not_auto_increment() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t ( -- mentions AUTOINCREMENT in a comment
                code TEXT PRIMARY KEY,
                n INT DEFAULT 'PRIMARY KEY AUTOINCREMENT'
            )",
        )
        .unwrap();
        let raw = SqliteCatalog::from_connection(conn).unwrap().read_table("t", None).unwrap();
        assert!(raw.columns[0].primary);
        assert!(!raw.columns[0].auto_increment);
        // SQLite lets a non-rowid primary key hold NULL.
        assert!(raw.columns[0].nullable);
    }

    #[test]
    fn test_primary_key_nullability() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (code TEXT NOT NULL PRIMARY KEY);
             CREATE TABLE b (code TEXT PRIMARY KEY, v INT) WITHOUT ROWID;
             CREATE TABLE c (id INTEGER PRIMARY KEY, v INT);",
        )
        .unwrap();
        let catalog = SqliteCatalog::from_connection(conn).unwrap();
        assert!(!catalog.read_table("a", None).unwrap().columns[0].nullable);
        assert!(!catalog.read_table("b", None).unwrap().columns[0].nullable);
        let c = catalog.read_table("c", None).unwrap();
        assert!(!c.columns[0].nullable);
        assert!(c.columns[0].auto_increment);
    }

    #[test]
    fn test_strip_literals_and_comments() {
        let ddl = "CREATE TABLE \"AUTOINCREMENT\" ( -- AUTOINCREMENT\n  v TEXT DEFAULT 'it''s AUTOINCREMENT' /* AUTOINCREMENT */\n)";
        let stripped = strip_literals_and_comments(ddl);
        assert!(!stripped.contains("AUTOINCREMENT"));
        assert!(stripped.contains("DEFAULT _"));
    }

    #[test]
    fn test_expired_deadline_interrupts_catalog_read() {
        let conn = Connection::open_in_memory().unwrap();
        let columns: Vec<String> = (0..500).map(|i| format!("c{} INTEGER", i)).collect();
        conn.execute_batch(&format!("CREATE TABLE wide ({})", columns.join(", ")))
            .unwrap();
        let catalog = SqliteCatalog::from_connection(conn).unwrap();

        let err = catalog.read_table("wide", Some(Instant::now())).unwrap_err();
        assert!(matches!(err, Error::Timeout(ref t) if t == "wide"));

        // The progress handler is gone once the read returns.
        let raw = catalog.read_table("wide", None).unwrap();
        assert_eq!(raw.columns.len(), 500);
        let later = Instant::now() + std::time::Duration::from_secs(60);
        assert_eq!(catalog.read_table("wide", Some(later)).unwrap().columns.len(), 500);
    }
}
