//! ABOUTME: Paginated list view with search and optional filter set
//! ABOUTME: Renders the configured columns through the attribute renderer

use super::{check_fields, collection_url, instance_url, Action, PageView};
use crate::{
    context::{render_page, ContextContributor, PageContext},
    error::PageError,
    export::Field,
    filters::{FilterInput, FilterSet, QueryParams, SearchFilterable},
    middleware::Viewer,
    render::{verbose_name, AttributeRenderer, Markup},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use bo_core::{Error, Result};
use bo_db::{Model, QuerySet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One rendered line of the table
pub struct ListRow {
    pub cells: Vec<Markup>,
    pub detail_url: String,
    pub edit_url: String,
    pub delete_url: String,
}

/// Page links for the current listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub num_pages: u32,
    /// Empty on the first page
    pub previous_url: String,
    /// Empty on the last page
    pub next_url: String,
}

#[derive(Template)]
#[template(path = "list.html")]
struct ListPage {
    ctx: PageContext,
    title: String,
    headers: Vec<String>,
    rows: Vec<ListRow>,
    count: i64,
    create_url: String,
    export_url: String,
    searchable: bool,
    filters: Vec<FilterInput>,
    pagination: Pagination,
}

/// Page number and page count, `None` when the requested page doesn't exist
///
/// An empty listing still has one page; `last` names the final page.
pub fn paginate(count: i64, per_page: u32, page: Option<&str>) -> Option<(u32, u32)> {
    let per_page = i64::from(per_page.max(1));
    let num_pages = u32::try_from(((count.max(0) + per_page - 1) / per_page).max(1)).ok()?;
    let page = match page.map(str::trim) {
        None | Some("") => 1,
        Some("last") => num_pages,
        Some(raw) => raw.parse().ok()?,
    };
    (1..=num_pages).contains(&page).then_some((page, num_pages))
}

/// Link to `page` keeping the other query parameters
pub fn page_url(parameters: &str, page: u32) -> String {
    if parameters.is_empty() {
        format!("?page={}", page)
    } else {
        format!("?{}&page={}", parameters, page)
    }
}

/// Paginated, searchable listing of a model
pub struct ListView<M: Model> {
    queryset: QuerySet<M>,
    list_display: Vec<Field>,
    search_fields: Vec<&'static str>,
    filterset: Option<Box<dyn FilterSet<M>>>,
    paginate_by: Option<u32>,
    title: String,
    contributors: Vec<Box<dyn ContextContributor + Send + Sync>>,
}

impl<M: Model> ListView<M> {
    pub fn new(list_display: Vec<Field>) -> Self {
        Self {
            queryset: QuerySet::all(),
            list_display,
            search_fields: Vec::new(),
            filterset: None,
            paginate_by: None,
            title: M::MODEL_NAME.to_string(),
            contributors: Vec::new(),
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

    pub fn paginate_by(mut self, per_page: u32) -> Self {
        self.paginate_by = Some(per_page);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn context(mut self, contributor: impl ContextContributor + Send + Sync + 'static) -> Self {
        self.contributors.push(Box::new(contributor));
        self
    }

    /// Check the configured fields against the model
    pub fn build(self) -> Result<Self> {
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<()> {
        check_fields::<M>(self.list_display.iter().map(|f| f.name.as_str()))?;
        if let Some(field) = self.search_fields.iter().find(|f| M::column(f).is_none()) {
            return Err(Error::Config(format!(
                "Search field '{}' is not a column of {}",
                field,
                M::MODEL_NAME
            )));
        }
        if self.paginate_by == Some(0) {
            return Err(Error::Config("paginate_by must be positive".to_string()));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(model = M::MODEL_NAME))]
    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, PageError> {
        let params = QueryParams::parse(req.query_string());

        let mut queryset = self.apply_search(&params, self.queryset.clone())?;
        if let Some(filterset) = &self.filterset {
            queryset = filterset.apply(&params, queryset)?;
        }

        let count = queryset.count(state.db.pool()).await?;
        let per_page = self.paginate_by.unwrap_or(state.settings.paginate_by);
        let (page, num_pages) = paginate(count, per_page, params.get("page"))
            .ok_or_else(|| PageError::not_found("Invalid page"))?;
        debug!("Listing page {} of {} ({} records)", page, num_pages, count);

        let offset = i64::from(page - 1) * i64::from(per_page);
        let records = queryset
            .slice(offset, i64::from(per_page))
            .fetch_all(state.db.pool())
            .await?;

        let renderer = AttributeRenderer::new(&state.settings, &state.urls);
        let rows = records
            .iter()
            .map(|record| ListRow {
                cells: self
                    .list_display
                    .iter()
                    .map(|field| renderer.getattr(record, field))
                    .collect(),
                detail_url: instance_url::<M>(&state, Action::Detail, record.pk()).unwrap_or_default(),
                edit_url: instance_url::<M>(&state, Action::Edit, record.pk()).unwrap_or_default(),
                delete_url: instance_url::<M>(&state, Action::Delete, record.pk()).unwrap_or_default(),
            })
            .collect();

        let mut contributors: Vec<&dyn ContextContributor> = Vec::new();
        contributors.push(self);
        contributors.extend(
            self.contributors
                .iter()
                .map(|c| c.as_ref() as &dyn ContextContributor),
        );
        let ctx = PageContext::build(&req, &state, Some(&viewer), &contributors);

        let pagination = Pagination {
            page,
            num_pages,
            previous_url: if page > 1 {
                page_url(&ctx.parameters, page - 1)
            } else {
                String::new()
            },
            next_url: if page < num_pages {
                page_url(&ctx.parameters, page + 1)
            } else {
                String::new()
            },
        };

        let listing = ListPage {
            title: self.title.clone(),
            headers: self.list_display.iter().map(verbose_name::<M>).collect(),
            rows,
            count,
            create_url: collection_url::<M>(&state, Action::Create).unwrap_or_default(),
            export_url: collection_url::<M>(&state, Action::Export).unwrap_or_default(),
            searchable: !self.search_fields.is_empty(),
            filters: self
                .filterset
                .as_ref()
                .map(|f| f.inputs(&params))
                .unwrap_or_default(),
            pagination,
            ctx,
        };
        render_page(&listing, &listing.ctx)
    }
}

impl<M: Model> SearchFilterable for ListView<M> {
    fn search_fields(&self) -> &[&'static str] {
        &self.search_fields
    }
}

impl<M: Model> ContextContributor for ListView<M> {
    fn contribute(&self, params: &QueryParams, ctx: &mut PageContext) {
        ctx.search = params.get("search").unwrap_or_default().to_string();
        ctx.parameters = params.without("page");
    }
}

impl<M: Model> PageView for ListView<M> {
    fn action(&self) -> Action {
        Action::List
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
