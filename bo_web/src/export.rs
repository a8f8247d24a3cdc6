//! ABOUTME: CSV export pipeline from a queryset to a downloadable file
//! ABOUTME: Builds an ordered column table from streamed rows then writes it with csv

use actix_web::{http::header, HttpResponse};
use bo_core::{Error, Result};
use bo_db::{Model, QuerySet, Record, Value};
use futures_util::{pin_mut, TryStreamExt};
use linked_hash_map::LinkedHashMap;
use sqlx::SqlitePool;
use std::io::Write;
use tracing::{debug, instrument};

/// Field reference, optionally labelled for column headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub label: Option<String>,
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
        }
    }
}

impl From<(&str, &str)> for Field {
    fn from((name, label): (&str, &str)) -> Self {
        Self {
            name: name.to_string(),
            label: Some(label.to_string()),
        }
    }
}

/// Convert a list of names or pairs into fields
pub fn fields<F: Into<Field>>(items: impl IntoIterator<Item = F>) -> Vec<Field> {
    items.into_iter().map(Into::into).collect()
}

/// Column name -> one cell per exported record, in column order
pub type ColumnTable = LinkedHashMap<String, Vec<String>>;

/// Hook for custom cell conversion in an export
pub trait CsvExportable: Send + Sync {
    /// Convert a cell value; return `true` as second element when handled
    fn convert_value(&self, _field: &str, value: Value) -> (Value, bool) {
        (value, false)
    }
}

/// Exporter without custom conversions
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExporter;

impl CsvExportable for DefaultExporter {}

/// Relations become comma separated names, callables are evaluated
pub fn default_convert_value(value: Value) -> Value {
    match value {
        Value::Relation(items) => Value::Text(
            items
                .iter()
                .map(|item| item.display.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Callable(thunk) => thunk.call().resolve(),
        other => other,
    }
}

/// Column names for an export: labels dropped, `id` first when missing
pub fn export_columns(fields: &[Field]) -> Vec<String> {
    let mut columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    if !columns.iter().any(|c| c == "id") {
        columns.insert(0, "id".to_string());
    }
    columns
}

/// Cell text of one record attribute
pub fn export_cell(exporter: &dyn CsvExportable, record: &dyn Record, field: &str) -> String {
    let value = record.attr(field).unwrap_or(Value::Null);
    let (value, converted) = exporter.convert_value(field, value);
    let value = if converted {
        value
    } else {
        default_convert_value(value)
    };
    value.to_string()
}

/// Stream the queryset once and collect every column
#[instrument(skip_all, fields(model = M::MODEL_NAME))]
pub async fn build_table<M: Model>(
    queryset: &QuerySet<M>,
    pool: &SqlitePool,
    columns: &[String],
    exporter: &dyn CsvExportable,
) -> Result<ColumnTable> {
    let mut data = ColumnTable::new();
    for column in columns {
        data.insert(column.clone(), Vec::new());
    }

    let rows = queryset.iterator(pool);
    pin_mut!(rows);
    while let Some(record) = rows.try_next().await? {
        for (column, cells) in data.iter_mut() {
            cells.push(export_cell(exporter, &record, column));
        }
    }

    debug!(
        "Collected {} rows",
        data.values().next().map(Vec::len).unwrap_or(0)
    );
    Ok(data)
}

/// Write the header and one line per record into `writer`, returning it
pub fn create_csv_from_data<W: Write>(data: &ColumnTable, writer: W) -> Result<W> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let rows = data.values().next().map(Vec::len).unwrap_or(0);

    csv_writer
        .write_record(data.keys())
        .map_err(|e| Error::Io(e.into()))?;
    for index in 0..rows {
        let row = data
            .values()
            .map(|cells| cells.get(index).map(String::as_str).unwrap_or(""));
        csv_writer
            .write_record(row)
            .map_err(|e| Error::Io(e.into()))?;
    }

    csv_writer.flush()?;
    csv_writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Attachment response carrying the CSV bytes
pub fn csv_response(filename: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename.replace('"', "")),
        ))
        .body(body)
}
