//! ABOUTME: Record and Model traits describing how a row is exposed to the backoffice
//! ABOUTME: Column allow-lists keep dynamic query building away from raw input

use crate::value::Value;
use sqlx::{sqlite::SqliteRow, FromRow};
use std::fmt::Display;

/// A loaded row whose attributes can be read by name
pub trait Record: Display + Send + Sync {
    /// Lowercase model name used in route names, e.g. `user`
    fn model_name(&self) -> &'static str;

    fn pk(&self) -> i64;

    /// Attribute by name, `None` when the model has no such attribute
    fn attr(&self, name: &str) -> Option<Value>;

    /// Human label for a choice field's current value
    fn choice_display(&self, _name: &str) -> Option<String> {
        None
    }
}

/// A table-backed record type the query builder knows how to select
pub trait Model: Record + for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    const MODEL_NAME: &'static str;
    /// Table targeted by deletes
    const TABLE: &'static str;
    /// FROM clause, may carry aliases and joins
    const FROM: &'static str;
    /// Select list matching the `FromRow` implementation
    const SELECT: &'static str;
    /// Ordering used when a queryset has none
    const DEFAULT_ORDERING: &'static str = "pk";

    /// Column for a filterable field name; unmapped fields cannot be queried
    fn column(field: &str) -> Option<&'static str>;

    /// Attribute names a view may display or export
    fn fields() -> &'static [&'static str];

    fn verbose_name(_field: &str) -> Option<&'static str> {
        None
    }

    fn has_field(field: &str) -> bool {
        Self::fields().contains(&field) || field == "pk"
    }
}
