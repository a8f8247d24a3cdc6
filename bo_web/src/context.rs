//! ABOUTME: Shared template context assembled once per rendered page
//! ABOUTME: Site settings, navigation, pending messages and view contributions

use crate::{
    error::PageError,
    filters::QueryParams,
    flash::{self, FlashMessage},
    middleware::Viewer,
    sidebar::{build_sidebar, SidebarEntry},
    AppState,
};
use actix_web::{HttpRequest, HttpResponse};
use askama::Template;
use std::collections::BTreeMap;

/// Values every backoffice template can read
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub title: String,
    /// Empty when no logo is configured
    pub logo: String,
    pub index_url: String,
    pub sign_in_url: String,
    pub sign_out_url: String,
    pub primary_color: String,
    pub accent_color: String,
    pub sidebar: Vec<SidebarEntry>,
    pub messages: Vec<FlashMessage>,
    /// Empty for anonymous visitors
    pub username: String,
    pub search: String,
    /// Current query string without `page`
    pub parameters: String,
    pub extra: BTreeMap<String, String>,
}

/// A view capability adding its own entries to the page context
pub trait ContextContributor {
    fn contribute(&self, params: &QueryParams, ctx: &mut PageContext);
}

impl PageContext {
    /// Build the context for `req`; route URLs that can't be reversed stay empty
    pub fn build(
        req: &HttpRequest,
        state: &AppState,
        viewer: Option<&Viewer>,
        contributors: &[&dyn ContextContributor],
    ) -> Self {
        let settings = &state.settings;
        let route = |name: &str| state.urls.reverse_or_empty(&settings.route_name(name));

        let mut ctx = Self {
            title: settings.title.clone(),
            logo: settings.logo.clone().unwrap_or_default(),
            index_url: route("index"),
            sign_in_url: route("sign-in"),
            sign_out_url: route("sign-out"),
            primary_color: settings.primary_color.clone(),
            accent_color: settings.accent_color.clone(),
            sidebar: build_sidebar(settings, &state.urls, viewer, req.path()),
            messages: flash::read_messages(req),
            username: viewer.map(|v| v.username().to_string()).unwrap_or_default(),
            ..Self::default()
        };

        let params = QueryParams::parse(req.query_string());
        for contributor in contributors {
            contributor.contribute(&params, &mut ctx);
        }
        ctx
    }

    pub fn is_authenticated(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn extra(&self, key: &str) -> &str {
        self.extra.get(key).map(String::as_str).unwrap_or_default()
    }
}

/// Render `page`; displayed messages are cleared from the client
pub fn render_page<T: Template>(page: &T, ctx: &PageContext) -> Result<HttpResponse, PageError> {
    let html = page.render()?;
    let mut response = HttpResponse::Ok();
    response.content_type("text/html; charset=utf-8");
    if !ctx.messages.is_empty() {
        response.cookie(flash::removal_cookie());
    }
    Ok(response.body(html))
}
