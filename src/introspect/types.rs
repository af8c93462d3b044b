//! Declared-type mapping
//!
//! Every declared type maps to a category, a server type and a client type by
//! case-insensitive substring matching. The first matching row wins, so the
//! table order matters (`bigint` must be tested before plain `int`).

use crate::schema::TypeCategory;
use regex::Regex;
use std::sync::OnceLock;

/// Resolved mapping for one declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub category: TypeCategory,
    pub server_type: &'static str,
    pub client_type: &'static str,
}

/// Server type emitted for temporal columns that carry a time part
pub const DATETIME_SERVER_TYPE: &str = "chrono::NaiveDateTime";
pub const DATE_SERVER_TYPE: &str = "chrono::NaiveDate";

struct Row {
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
    mapping: TypeMapping,
}

const fn row(
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
    category: TypeCategory,
    server_type: &'static str,
    client_type: &'static str,
) -> Row {
    Row {
        all_of,
        any_of,
        mapping: TypeMapping {
            category,
            server_type,
            client_type,
        },
    }
}

const TABLE: &[Row] = &[
    row(&["int", "big"], &[], TypeCategory::Integer, "i64", "number"),
    row(&["int", "medium"], &[], TypeCategory::Integer, "i32", "number"),
    row(&["int", "small"], &[], TypeCategory::Integer, "i16", "number"),
    row(&["int", "tiny"], &[], TypeCategory::Integer, "i8", "number"),
    row(&["int"], &[], TypeCategory::Integer, "i32", "number"),
    row(&[], &["bool"], TypeCategory::Boolean, "bool", "boolean"),
    row(&[], &["datetime", "timestamp"], TypeCategory::Temporal, DATETIME_SERVER_TYPE, "string"),
    row(&[], &["date"], TypeCategory::Temporal, DATE_SERVER_TYPE, "string"),
    row(&[], &["text", "clob"], TypeCategory::Text, "String", "string"),
    row(&[], &["json"], TypeCategory::Json, "serde_json::Value", "unknown"),
    // Decimals travel as text so no precision is lost to floating point.
    row(&[], &["decimal", "numeric"], TypeCategory::Decimal, "String", "number"),
    row(&[], &["float", "double", "real"], TypeCategory::Decimal, "f64", "number"),
    row(&[], &["blob", "binary"], TypeCategory::Binary, "Vec<u8>", "string"),
];

const DEFAULT: TypeMapping = TypeMapping {
    category: TypeCategory::Text,
    server_type: "String",
    client_type: "string",
};

/// Map a declared type string. Total: unknown types fall back to text.
pub fn map_type(declared: &str) -> TypeMapping {
    let lower = declared.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|r| {
            r.all_of.iter().all(|s| lower.contains(s))
                && (r.any_of.is_empty() || r.any_of.iter().any(|s| lower.contains(s)))
        })
        .map(|r| r.mapping)
        .unwrap_or(DEFAULT)
}

fn modifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)").expect("modifier pattern is valid")
    })
}

/// Parenthesized length and optional scale (`decimal(10,2)` -> `(10, Some(2))`)
pub fn type_modifiers(declared: &str) -> Option<(u32, Option<u32>)> {
    let caps = modifier_re().captures(declared)?;
    let length = caps.get(1)?.as_str().parse().ok()?;
    let scale = caps.get(2).and_then(|m| m.as_str().parse().ok());
    Some((length, scale))
}
