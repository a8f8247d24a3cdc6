//! ABOUTME: Generic page views and the helpers they share
//! ABOUTME: Each view registers itself as an actix resource under its resource segment

use crate::{
    flash::{self, FlashMessage},
    AppState,
};
use actix_web::{http::header::LOCATION, HttpRequest, HttpResponse};
use bo_core::{Error, Result};
use bo_db::Model;
use std::sync::Arc;

pub mod auth;
pub mod create;
pub mod delete;
pub mod detail;
pub mod edit;
pub mod export;
pub mod index;
pub mod list;

pub use auth::{sign_in, sign_in_page, sign_out, SignInForm};
pub use create::CreateView;
pub use delete::DeleteView;
pub use detail::DetailView;
pub use edit::EditView;
pub use export::ExportView;
pub use index::{IndexView, Statistic, StatisticsProvider};
pub use list::ListView;

/// What a view does with its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Detail,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    /// Suffix of the route name, e.g. `user-list`
    pub fn name(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Detail => "detail",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }

    /// Path below the resource segment
    pub fn suffix(&self) -> &'static str {
        match self {
            Action::List => "",
            Action::Detail => "{pk}/",
            Action::Create => "create/",
            Action::Edit => "{pk}/edit/",
            Action::Delete => "{pk}/delete/",
            Action::Export => "export/",
        }
    }
}

/// A page handler mounted under a resource
pub trait PageView: Send + Sync + 'static {
    fn action(&self) -> Action;

    /// Lowercase model name used in route names
    fn model_name(&self) -> &'static str;

    /// Actix resource serving this view at `path`
    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource;

    /// Configuration check run before any route is registered
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Route name of `action` on `model`, e.g. `backoffice:user-edit`
pub fn route_name(state: &AppState, model: &str, action: Action) -> String {
    state
        .settings
        .route_name(&format!("{}-{}", model, action.name()))
}

/// URL of an action on one instance
pub fn instance_url<M: Model>(state: &AppState, action: Action, pk: i64) -> Option<String> {
    state
        .urls
        .reverse(&route_name(state, M::MODEL_NAME, action), &[("pk", &pk.to_string())])
        .ok()
}

/// URL of an action on the whole resource
pub fn collection_url<M: Model>(state: &AppState, action: Action) -> Option<String> {
    state
        .urls
        .reverse(&route_name(state, M::MODEL_NAME, action), &[])
        .ok()
}

/// Detail page of an instance, else its list, else the site root
pub fn success_url<M: Model>(state: &AppState, pk: i64) -> String {
    instance_url::<M>(state, Action::Detail, pk)
        .or_else(|| collection_url::<M>(state, Action::List))
        .unwrap_or_else(|| "/".to_string())
}

/// 302 to `location`, queueing `message` for the next page
pub fn redirect_with_message(req: &HttpRequest, location: &str, message: FlashMessage) -> HttpResponse {
    let mut messages = flash::read_messages(req);
    messages.push(message);
    HttpResponse::Found()
        .insert_header((LOCATION, location.to_string()))
        .cookie(flash::flash_cookie(&messages))
        .finish()
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location.to_string()))
        .finish()
}

/// Reject attribute names the model doesn't expose
pub(crate) fn check_fields<M: Model>(names: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
    for name in names {
        let name = name.as_ref();
        if !M::has_field(name) {
            return Err(Error::Config(format!(
                "Unknown field '{}' for {}",
                name,
                M::MODEL_NAME
            )));
        }
    }
    Ok(())
}
