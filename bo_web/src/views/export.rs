//! ABOUTME: Export view streaming a filtered queryset into a CSV download
//! ABOUTME: Honours the same search and filter parameters as the list page

use super::{check_fields, Action, PageView};
use crate::{
    error::PageError,
    export::{build_table, create_csv_from_data, csv_response, export_columns, CsvExportable, DefaultExporter, Field},
    filters::{FilterSet, QueryParams, SearchFilterable},
    middleware::Viewer,
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use bo_core::{Error, Result};
use bo_db::{Model, QuerySet};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct ExportView<M: Model> {
    queryset: QuerySet<M>,
    fields: Vec<Field>,
    filename: String,
    search_fields: Vec<&'static str>,
    filterset: Option<Box<dyn FilterSet<M>>>,
    exporter: Box<dyn CsvExportable>,
}

impl<M: Model> ExportView<M> {
    pub fn new(fields: Vec<Field>, filename: impl Into<String>) -> Self {
        Self {
            queryset: QuerySet::all(),
            fields,
            filename: filename.into(),
            search_fields: Vec::new(),
            filterset: None,
            exporter: Box::new(DefaultExporter),
        }
    }

    pub fn queryset(mut self, queryset: QuerySet<M>) -> Self {
        self.queryset = queryset;
        self
    }

    pub fn search_fields(mut self, fields: &[&'static str]) -> Self {
        self.search_fields = fields.to_vec();
        self
    }

    pub fn filterset(mut self, filterset: impl FilterSet<M> + 'static) -> Self {
        self.filterset = Some(Box::new(filterset));
        self
    }

    /// Custom cell conversion
    pub fn exporter(mut self, exporter: impl CsvExportable + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    pub fn build(self) -> Result<Self> {
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(Error::Config(format!(
                "Export of {} needs a filename",
                M::MODEL_NAME
            )));
        }
        check_fields::<M>(self.fields.iter().map(|f| f.name.as_str()))
    }

    #[instrument(skip(self, req, state, viewer), fields(model = M::MODEL_NAME))]
    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, PageError> {
        let params = QueryParams::parse(req.query_string());
        let mut queryset = self.apply_search(&params, self.queryset.clone())?;
        if let Some(filterset) = &self.filterset {
            queryset = filterset.apply(&params, queryset)?;
        }

        let columns = export_columns(&self.fields);
        let table = build_table(&queryset, state.db.pool(), &columns, self.exporter.as_ref()).await?;
        let rows = table.values().next().map(Vec::len).unwrap_or(0) as u64;
        let body = create_csv_from_data(&table, Vec::new())?;

        state.metrics.add_exported_rows(rows);
        info!("{} exported {} rows to {}", viewer.username(), rows, self.filename);
        Ok(csv_response(&self.filename, body))
    }
}

impl<M: Model> SearchFilterable for ExportView<M> {
    fn search_fields(&self) -> &[&'static str] {
        &self.search_fields
    }
}

impl<M: Model> PageView for ExportView<M> {
    fn action(&self) -> Action {
        Action::Export
    }

    fn model_name(&self) -> &'static str {
        M::MODEL_NAME
    }

    fn validate(&self) -> Result<()> {
        self.check()
    }

    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        web::resource(path).route(web::get().to(
            move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer| {
                let view = Arc::clone(&self);
                async move { view.get(req, state, viewer).await }
            },
        ))
    }
}
