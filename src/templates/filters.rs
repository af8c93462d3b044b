//! Helper functions and filters available to templates
//!
//! The helper set is fixed and versioned by [`HELPERS_VERSION`]; templates
//! can read `helpers_version` to guard against running on an older engine.
//!
//! Filters: `camel_case`, `pascal_case`, `snake_case`, `kebab_case`,
//! `escape_string`, `sql_string`, `sql_op`.
//! Functions: `query_fields`, `list_fields`, `form_fields`,
//! `needs_time_import`, `permission`.

use crate::naming;
use crate::schema::{ColumnDescriptor, QueryOp, TypeCategory};
use minijinja::value::{Value, ViaDeserialize};
use minijinja::Environment;

pub const HELPERS_VERSION: u32 = 1;

/// Settings for the field-list helpers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilters {
    /// Columns never offered as form inputs
    pub form_denylist: Vec<String>,
}

impl Default for FieldFilters {
    fn default() -> Self {
        Self {
            form_denylist: ["id", "created_at", "updated_at", "deleted_at", "password_hash", "salt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Register all helpers with the environment
pub fn register(env: &mut Environment<'_>, field_filters: FieldFilters) {
    env.add_global("helpers_version", HELPERS_VERSION);

    env.add_filter("camel_case", filter_camel_case);
    env.add_filter("pascal_case", filter_pascal_case);
    env.add_filter("snake_case", filter_snake_case);
    env.add_filter("kebab_case", filter_kebab_case);
    env.add_filter("escape_string", escape_string);
    env.add_filter("sql_string", sql_string);
    env.add_filter("sql_op", |op: ViaDeserialize<QueryOp>| op.0.symbol());

    env.add_function("query_fields", |columns: ViaDeserialize<Vec<ColumnDescriptor>>| {
        Value::from_serialize(query_fields(&columns.0))
    });
    env.add_function("list_fields", |columns: ViaDeserialize<Vec<ColumnDescriptor>>| {
        Value::from_serialize(list_fields(&columns.0))
    });
    let denylist = field_filters.form_denylist;
    env.add_function("form_fields", move |columns: ViaDeserialize<Vec<ColumnDescriptor>>| {
        Value::from_serialize(form_fields(&columns.0, &denylist))
    });
    env.add_function("needs_time_import", |columns: ViaDeserialize<Vec<ColumnDescriptor>>| {
        needs_time_import(&columns.0)
    });
    env.add_function("permission", permission);
}

// Filter wrappers that delegate to the naming module
fn filter_camel_case(value: &str) -> String {
    naming::to_camel(value)
}

fn filter_pascal_case(value: &str) -> String {
    naming::to_pascal(value)
}

fn filter_snake_case(value: &str) -> String {
    naming::to_snake(value)
}

fn filter_kebab_case(value: &str) -> String {
    naming::to_kebab(value)
}

/// Escape string for use in generated code
fn escape_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Body of a single-quoted SQL literal: quotes doubled, backslashes escaped
fn sql_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// Permission key for one operation of an entity
fn permission(module: &str, entity_kebab: &str, verb: &str) -> String {
    format!("{}:{}:{}", module, entity_kebab, verb)
}

/// Query-eligible columns
pub fn query_fields(columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    columns.iter().filter(|c| c.is_query).cloned().collect()
}

/// List-visible columns, primary key first when it is visible.
pub fn list_fields(columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    let mut fields: Vec<ColumnDescriptor> = columns
        .iter()
        .filter(|c| c.is_list && !c.is_primary)
        .cloned()
        .collect();
    if let Some(pk) = columns.iter().find(|c| c.is_primary && c.is_list) {
        fields.insert(0, pk.clone());
    }
    fields
}

/// Columns editable in forms
pub fn form_fields(columns: &[ColumnDescriptor], denylist: &[String]) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .filter(|c| !denylist.iter().any(|d| *d == c.name))
        .cloned()
        .collect()
}

/// Whether any column maps to a temporal type
pub fn needs_time_import(columns: &[ColumnDescriptor]) -> bool {
    columns.iter().any(|c| c.category == TypeCategory::Temporal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::{column, sys_user};

    fn names(columns: &[ColumnDescriptor]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_list_fields_primary_key_leads() {
        let mut table = sys_user();
        // Put the key last to prove it is moved to the front.
        let id = table.columns.remove(0);
        table.columns.push(id);
        assert_eq!(names(&list_fields(&table.columns)), ["id", "user_name", "status"]);
    }

    #[test]
    fn test_list_fields_hidden_primary_key_stays_out() {
        let mut table = sys_user();
        table.columns[0].is_list = false;
        assert_eq!(names(&list_fields(&table.columns)), ["user_name", "status"]);
    }

    #[test]
    fn test_query_and_form_fields() {
        let table = sys_user();
        assert_eq!(names(&query_fields(&table.columns)), ["status"]);
        let deny = FieldFilters::default().form_denylist;
        assert_eq!(names(&form_fields(&table.columns, &deny)), ["user_name", "status"]);
    }

    #[test]
    fn test_needs_time_import() {
        assert!(needs_time_import(&sys_user().columns));
        assert!(!needs_time_import(&[column("id", "int", TypeCategory::Integer)]));
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "hello");
        assert_eq!(escape_string("hello\"world"), "hello\\\"world");
        assert_eq!(escape_string("line1\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_sql_string() {
        assert_eq!(sql_string("plain"), "plain");
        assert_eq!(sql_string("Customer's account"), "Customer''s account");
        assert_eq!(sql_string("a\\'); DROP TABLE x; --"), "a\\\\''); DROP TABLE x; --");
    }

    #[test]
    fn test_sql_op_filter() {
        let mut env = Environment::new();
        register(&mut env, FieldFilters::default());
        let out = env
            .render_str(
                "{{ ops[0] | sql_op }} {{ ops[1] | sql_op }}",
                minijinja::context! { ops => vec![QueryOp::Eq, QueryOp::Like] },
            )
            .unwrap();
        assert_eq!(out, "= LIKE");
    }

    #[test]
    fn test_helpers_in_templates() {
        let mut env = Environment::new();
        register(&mut env, FieldFilters::default());
        let table = sys_user();
        let out = env
            .render_str(
                "{% for c in list_fields(columns) %}{{ c.name | camel_case }} {% endfor %}\
                 {{ 'true' if needs_time_import(columns) else 'false' }} {{ permission('sys', 'user', 'add') }} \
                 {{ 'UserRole' | kebab_case }} v{{ helpers_version }}",
                minijinja::context! { columns => table.columns },
            )
            .unwrap();
        assert_eq!(out, "id userName status true sys:user:add user-role v1");
    }
}
