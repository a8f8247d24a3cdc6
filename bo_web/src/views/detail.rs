//! ABOUTME: Detail view showing labelled attributes of one record
//! ABOUTME: Looks the record up through the view's queryset, 404 when absent

use super::{check_fields, collection_url, instance_url, Action, PageView};
use crate::{
    context::{render_page, PageContext},
    error::PageError,
    export::Field,
    middleware::Viewer,
    render::{verbose_name, AttributeRenderer, Markup},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use bo_core::Result;
use bo_db::{Model, QuerySet};
use std::sync::Arc;
use tracing::instrument;

pub struct DetailRow {
    pub label: String,
    pub value: Markup,
}

#[derive(Template)]
#[template(path = "detail.html")]
struct DetailPage {
    ctx: PageContext,
    title: String,
    rows: Vec<DetailRow>,
    list_url: String,
    edit_url: String,
    delete_url: String,
}

pub struct DetailView<M: Model> {
    queryset: QuerySet<M>,
    fields: Vec<Field>,
}

impl<M: Model> DetailView<M> {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            queryset: QuerySet::all(),
            fields,
        }
    }

    /// Records outside this queryset answer 404
    pub fn queryset(mut self, queryset: QuerySet<M>) -> Self {
        self.queryset = queryset;
        self
    }

    pub fn build(self) -> Result<Self> {
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<()> {
        check_fields::<M>(self.fields.iter().map(|f| f.name.as_str()))
    }

    #[instrument(skip(self, req, state, viewer), fields(model = M::MODEL_NAME))]
    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: i64) -> Result<HttpResponse, PageError> {
        let instance = self
            .queryset
            .clone()
            .filter_pk(pk)?
            .first(state.db.pool())
            .await?
            .ok_or_else(|| PageError::not_found(format!("{} {}", M::MODEL_NAME, pk)))?;

        let renderer = AttributeRenderer::new(&state.settings, &state.urls);
        let rows = self
            .fields
            .iter()
            .map(|field| DetailRow {
                label: verbose_name::<M>(field),
                value: renderer.getattr(&instance, field),
            })
            .collect();

        let page = DetailPage {
            ctx: PageContext::build(&req, &state, Some(&viewer), &[]),
            title: instance.to_string(),
            rows,
            list_url: collection_url::<M>(&state, Action::List).unwrap_or_default(),
            edit_url: instance_url::<M>(&state, Action::Edit, pk).unwrap_or_default(),
            delete_url: instance_url::<M>(&state, Action::Delete, pk).unwrap_or_default(),
        };
        render_page(&page, &page.ctx)
    }
}

impl<M: Model> PageView for DetailView<M> {
    fn action(&self) -> Action {
        Action::Detail
    }

    fn model_name(&self) -> &'static str {
        M::MODEL_NAME
    }

    fn validate(&self) -> Result<()> {
        self.check()
    }

    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        web::resource(path).route(web::get().to(
            move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: web::Path<i64>| {
                let view = Arc::clone(&self);
                async move { view.get(req, state, viewer, pk.into_inner()).await }
            },
        ))
    }
}
