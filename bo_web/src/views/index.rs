//! ABOUTME: Dashboard page with figures from registered statistics providers
//! ABOUTME: A failing provider is logged and left out of the page

use crate::{
    context::{render_page, PageContext},
    error::PageError,
    middleware::Viewer,
    render::{statistics_value, StatisticsValue},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use async_trait::async_trait;
use bo_core::Result;
use bo_db::Db;
use std::sync::Arc;
use tracing::warn;

/// Labelled figure shown on the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    pub label: String,
    pub value: StatisticsValue,
    /// Format argument for float values
    pub float_format: Option<String>,
}

impl Statistic {
    pub fn new(label: impl Into<String>, value: StatisticsValue) -> Self {
        Self {
            label: label.into(),
            value,
            float_format: None,
        }
    }

    pub fn float_format(mut self, arg: impl Into<String>) -> Self {
        self.float_format = Some(arg.into());
        self
    }
}

/// Source of dashboard figures
#[async_trait]
pub trait StatisticsProvider: Send + Sync {
    async fn statistics(&self, db: &Db) -> Result<Vec<Statistic>>;
}

pub struct StatCard {
    pub label: String,
    pub value: String,
    pub help_text: String,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    ctx: PageContext,
    cards: Vec<StatCard>,
}

pub struct IndexView {
    providers: Vec<Arc<dyn StatisticsProvider>>,
}

impl IndexView {
    pub fn new(providers: Vec<Arc<dyn StatisticsProvider>>) -> Self {
        Self { providers }
    }

    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, PageError> {
        let mut cards = Vec::new();
        for provider in &self.providers {
            match provider.statistics(&state.db).await {
                Ok(statistics) => cards.extend(statistics.into_iter().map(|s| StatCard {
                    value: statistics_value(&s.value, s.float_format.as_deref()),
                    help_text: s.value.help_text.clone().unwrap_or_default(),
                    label: s.label,
                })),
                Err(e) => warn!("Statistics provider failed: {}", e),
            }
        }

        let page = IndexPage {
            ctx: PageContext::build(&req, &state, Some(&viewer), &[]),
            cards,
        };
        render_page(&page, &page.ctx)
    }

    pub fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        web::resource(path).route(web::get().to(
            move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer| {
                let view = Arc::clone(&self);
                async move { view.get(req, state, viewer).await }
            },
        ))
    }
}
