//! ABOUTME: Edit view updating an existing record through its model form
//! ABOUTME: Loads the record first so missing ids answer 404

use super::{create::FormPage, instance_url, redirect_with_message, success_url, Action, PageView};
use crate::{
    context::PageContext,
    error::PageError,
    flash::FlashMessage,
    forms::{bind_fields, FormData, FormError, FormErrors, ModelForm},
    middleware::Viewer,
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use bo_core::{Error, Result};
use bo_db::{Model, QuerySet, Record};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

pub struct EditView<F: ModelForm> {
    form: F,
    title: Option<String>,
}

pub struct EditViewBuilder<F: ModelForm> {
    form: Option<F>,
    title: Option<String>,
}

impl<F: ModelForm> EditView<F> {
    pub fn builder() -> EditViewBuilder<F> {
        EditViewBuilder {
            form: None,
            title: None,
        }
    }

    async fn load(&self, state: &AppState, pk: i64) -> Result<F::Model, PageError> {
        QuerySet::<F::Model>::all()
            .filter_pk(pk)?
            .first(state.db.pool())
            .await?
            .ok_or_else(|| PageError::not_found(format!("{} {}", F::Model::MODEL_NAME, pk)))
    }

    fn page(
        &self,
        req: &HttpRequest,
        state: &AppState,
        viewer: &Viewer,
        instance: &F::Model,
        data: &FormData,
        errors: &FormErrors,
    ) -> FormPage {
        FormPage {
            ctx: PageContext::build(req, state, Some(viewer), &[]),
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("Edit {}", instance)),
            fields: bind_fields(&self.form.fields(), data, errors),
            non_field_errors: errors.non_field.clone(),
            cancel_url: instance_url::<F::Model>(state, Action::Detail, instance.pk())
                .unwrap_or_default(),
        }
    }

    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: i64) -> Result<HttpResponse, PageError> {
        let instance = self.load(&state, pk).await?;
        let data = self.form.initial(&instance);
        self.page(&req, &state, &viewer, &instance, &data, &FormErrors::default())
            .respond()
    }

    #[instrument(skip(self, req, state, viewer, form), fields(model = F::Model::MODEL_NAME))]
    async fn post(
        &self,
        req: HttpRequest,
        state: web::Data<AppState>,
        viewer: Viewer,
        pk: i64,
        form: HashMap<String, String>,
    ) -> Result<HttpResponse, PageError> {
        let instance = self.load(&state, pk).await?;
        let data = FormData::from(form);
        match self.form.save(state.db.pool(), &data, Some(&instance)).await {
            Ok(updated) => {
                debug!("Updated {} {}", F::Model::MODEL_NAME, pk);
                Ok(redirect_with_message(
                    &req,
                    &success_url::<F::Model>(&state, updated.pk()),
                    FlashMessage::success(format!("{} updated", updated)),
                ))
            }
            Err(FormError::Invalid(errors)) => {
                debug!("Edit form rejected: {:?}", errors);
                self.page(&req, &state, &viewer, &instance, &data, &errors)
                    .respond()
            }
            Err(FormError::Failed(e)) => Err(e.into()),
        }
    }
}

impl<F: ModelForm> EditViewBuilder<F> {
    pub fn form(mut self, form: F) -> Self {
        self.form = Some(form);
        self
    }

    /// Fixed page title; defaults to "Edit <record>"
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<EditView<F>> {
        let form = self.form.ok_or_else(|| {
            Error::Config(format!("Edit view for {} has no form", F::Model::MODEL_NAME))
        })?;
        Ok(EditView {
            form,
            title: self.title,
        })
    }
}

impl<F: ModelForm> PageView for EditView<F> {
    fn action(&self) -> Action {
        Action::Edit
    }

    fn model_name(&self) -> &'static str {
        F::Model::MODEL_NAME
    }

    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        let view = Arc::clone(&self);
        web::resource(path)
            .route(web::get().to(
                move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer, pk: web::Path<i64>| {
                    let view = Arc::clone(&view);
                    async move { view.get(req, state, viewer, pk.into_inner()).await }
                },
            ))
            .route(web::post().to(
                move |req: HttpRequest,
                      state: web::Data<AppState>,
                      viewer: Viewer,
                      pk: web::Path<i64>,
                      form: web::Form<HashMap<String, String>>| {
                    let view = Arc::clone(&self);
                    async move {
                        view.post(req, state, viewer, pk.into_inner(), form.into_inner())
                            .await
                    }
                },
            ))
    }
}
