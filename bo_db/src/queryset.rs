//! ABOUTME: Lazily evaluated query description over a Model
//! ABOUTME: Supports equality, date range and search filters plus ordering and slicing

use crate::{is_safe_column_ref, model::Model};
use bo_core::{Error, Result};
use futures_util::{Stream, TryStreamExt};
use sqlx::SqlitePool;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// Bound parameter of a generated query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(&'static str, SqlParam),
    DateFrom(&'static str, String),
    DateTo(&'static str, String),
    Search(Vec<&'static str>, String),
}

/// Filterable, orderable query over `M`, evaluated only by the fetch methods
pub struct QuerySet<M> {
    conditions: Vec<Condition>,
    ordering: Vec<(&'static str, bool)>,
    limit: Option<i64>,
    offset: Option<i64>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("conditions", &self.conditions)
            .field("ordering", &self.ordering)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<M: Model> Default for QuerySet<M> {
    fn default() -> Self {
        Self::all()
    }
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl<M: Model> QuerySet<M> {
    pub fn all() -> Self {
        Self {
            conditions: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            _model: PhantomData,
        }
    }

    fn column(field: &str) -> Result<&'static str> {
        M::column(field)
            .filter(|column| is_safe_column_ref(column))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Field '{}' can't be queried on {}",
                    field,
                    M::MODEL_NAME
                ))
            })
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<SqlParam>) -> Result<Self> {
        let column = Self::column(field)?;
        self.conditions.push(Condition::Eq(column, value.into()));
        Ok(self)
    }

    pub fn filter_pk(self, pk: i64) -> Result<Self> {
        self.filter_eq("pk", pk)
    }

    /// Keep rows whose date part is on or after `date` (YYYY-MM-DD)
    pub fn filter_date_from(mut self, field: &str, date: &str) -> Result<Self> {
        let column = Self::column(field)?;
        self.conditions
            .push(Condition::DateFrom(column, date.to_string()));
        Ok(self)
    }

    /// Keep rows whose date part is on or before `date` (YYYY-MM-DD)
    pub fn filter_date_to(mut self, field: &str, date: &str) -> Result<Self> {
        let column = Self::column(field)?;
        self.conditions.push(Condition::DateTo(column, date.to_string()));
        Ok(self)
    }

    /// Case-insensitive "contains" match ORed across `fields`
    pub fn search(mut self, fields: &[&str], term: &str) -> Result<Self> {
        if fields.is_empty() || term.is_empty() {
            return Ok(self);
        }
        let columns = fields
            .iter()
            .map(|f| Self::column(f))
            .collect::<Result<Vec<_>>>()?;
        self.conditions
            .push(Condition::Search(columns, term.to_string()));
        Ok(self)
    }

    /// Replace the ordering; a leading `-` sorts descending
    pub fn order_by(mut self, fields: &[&str]) -> Result<Self> {
        self.ordering.clear();
        for field in fields {
            let (name, descending) = match field.strip_prefix('-') {
                Some(name) => (name, true),
                None => (*field, false),
            };
            self.ordering.push((Self::column(name)?, descending));
        }
        Ok(self)
    }

    pub fn slice(mut self, offset: i64, limit: i64) -> Self {
        self.offset = Some(offset.max(0));
        self.limit = Some(limit.max(0));
        self
    }

    fn where_clause(&self, sql: &mut String, params: &mut Vec<SqlParam>) {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            match condition {
                Condition::Eq(column, value) => {
                    clauses.push(format!("{} = ?", column));
                    params.push(value.clone());
                }
                Condition::DateFrom(column, date) => {
                    clauses.push(format!("date({}) >= date(?)", column));
                    params.push(SqlParam::Text(date.clone()));
                }
                Condition::DateTo(column, date) => {
                    clauses.push(format!("date({}) <= date(?)", column));
                    params.push(SqlParam::Text(date.clone()));
                }
                Condition::Search(columns, term) => {
                    let pattern = like_pattern(term);
                    let ors: Vec<String> = columns
                        .iter()
                        .map(|column| {
                            params.push(SqlParam::Text(pattern.clone()));
                            format!("{} LIKE ? ESCAPE '\\'", column)
                        })
                        .collect();
                    clauses.push(format!("({})", ors.join(" OR ")));
                }
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }

    /// SELECT statement and its parameters
    pub fn to_sql(&self) -> Result<(String, Vec<SqlParam>)> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", M::SELECT, M::FROM);
        self.where_clause(&mut sql, &mut params);

        let ordering = if self.ordering.is_empty() {
            let default = M::DEFAULT_ORDERING;
            let (name, descending) = match default.strip_prefix('-') {
                Some(name) => (name, true),
                None => (default, false),
            };
            vec![(Self::column(name)?, descending)]
        } else {
            self.ordering.clone()
        };
        let order: Vec<String> = ordering
            .iter()
            .map(|(column, descending)| {
                format!("{} {}", column, if *descending { "DESC" } else { "ASC" })
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(SqlParam::Int(limit));
                params.push(SqlParam::Int(offset.unwrap_or(0)));
            }
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(SqlParam::Int(offset));
            }
            (None, None) => {}
        }

        Ok((sql, params))
    }

    #[instrument(skip(self, pool), fields(model = M::MODEL_NAME))]
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<M>> {
        let (sql, params) = self.to_sql()?;
        debug!("Fetching rows: {}", sql);

        let mut query = sqlx::query_as::<_, M>(&sql);
        for param in params {
            query = match param {
                SqlParam::Int(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
            };
        }
        query
            .fetch_all(pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to fetch {}: {}", M::MODEL_NAME, e)))
    }

    #[instrument(skip(self, pool), fields(model = M::MODEL_NAME))]
    pub async fn first(&self, pool: &SqlitePool) -> Result<Option<M>> {
        let (sql, params) = self.clone().slice(self.offset.unwrap_or(0), 1).to_sql()?;

        let mut query = sqlx::query_as::<_, M>(&sql);
        for param in params {
            query = match param {
                SqlParam::Int(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
            };
        }
        query
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to fetch {}: {}", M::MODEL_NAME, e)))
    }

    /// Number of matching rows, ignoring ordering and slicing
    #[instrument(skip(self, pool), fields(model = M::MODEL_NAME))]
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", M::FROM);
        self.where_clause(&mut sql, &mut params);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in params {
            query = match param {
                SqlParam::Int(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
            };
        }
        query
            .fetch_one(pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count {}: {}", M::MODEL_NAME, e)))
    }

    /// Stream rows one at a time without buffering the result set
    pub fn iterator<'a>(&self, pool: &'a SqlitePool) -> impl Stream<Item = Result<M>> + 'a {
        let statement = self.to_sql();
        async_stream::try_stream! {
            let (sql, params) = statement?;
            debug!(model = M::MODEL_NAME, "Streaming rows: {}", sql);

            let mut query = sqlx::query_as::<_, M>(&sql);
            for param in params {
                query = match param {
                    SqlParam::Int(v) => query.bind(v),
                    SqlParam::Text(v) => query.bind(v),
                };
            }
            let mut rows = query.fetch(pool);
            while let Some(row) = rows
                .try_next()
                .await
                .map_err(|e| Error::Database(format!("Failed to stream {}: {}", M::MODEL_NAME, e)))?
            {
                yield row;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
