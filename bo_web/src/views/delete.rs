//! ABOUTME: Delete view removing one record and returning to the list
//! ABOUTME: Records still referenced elsewhere are kept and reported with an error message

use super::{collection_url, redirect_with_message, Action, PageView};
use crate::{error::PageError, flash::FlashMessage, middleware::Viewer, AppState};
use actix_web::{web, HttpRequest, HttpResponse};
use bo_core::{Error, Result};
use bo_db::{delete_by_pk, is_safe_sql_identifier, Model, QuerySet};
use std::{marker::PhantomData, sync::Arc};
use tracing::{info, instrument, warn};

pub struct DeleteView<M: Model> {
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> DeleteView<M> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }

    #[instrument(skip(self, req, state, viewer), fields(model = M::MODEL_NAME))]
    async fn delete(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: i64) -> Result<HttpResponse, PageError> {
        let instance = QuerySet::<M>::all()
            .filter_pk(pk)?
            .first(state.db.pool())
            .await?
            .ok_or_else(|| PageError::not_found(format!("{} {}", M::MODEL_NAME, pk)))?;

        let message = match delete_by_pk::<M>(state.db.pool(), pk).await {
            Ok(()) => {
                info!("{} deleted {} {}", viewer.username(), M::MODEL_NAME, pk);
                FlashMessage::success(format!("{} deleted", instance))
            }
            Err(Error::Protected(reason)) => {
                warn!("Delete refused: {}", reason);
                FlashMessage::error(format!("{} can't be deleted", instance))
            }
            Err(e) => return Err(e.into()),
        };

        let list_url = collection_url::<M>(&state, Action::List).unwrap_or_else(|| "/".to_string());
        Ok(redirect_with_message(&req, &list_url, message))
    }
}

impl<M: Model> Default for DeleteView<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> PageView for DeleteView<M> {
    fn action(&self) -> Action {
        Action::Delete
    }

    fn model_name(&self) -> &'static str {
        M::MODEL_NAME
    }

    fn validate(&self) -> Result<()> {
        if !is_safe_sql_identifier(M::TABLE) {
            return Err(Error::Config(format!(
                "Table '{}' of {} can't be deleted from",
                M::TABLE,
                M::MODEL_NAME
            )));
        }
        Ok(())
    }

    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        let view = Arc::clone(&self);
        web::resource(path)
            .route(web::get().to(
                move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: web::Path<i64>| {
                    let view = Arc::clone(&view);
                    async move { view.delete(req, state, viewer, pk.into_inner()).await }
                },
            ))
            .route(web::post().to(
                move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: web::Path<i64>| {
                    let view = Arc::clone(&self);
                    async move { view.delete(req, state, viewer, pk.into_inner()).await }
                },
            ))
    }
}
