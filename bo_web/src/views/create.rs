//! ABOUTME: Create view rendering a model form and saving valid submissions
//! ABOUTME: Redirects to the new record with a success message

use super::{collection_url, redirect_with_message, success_url, Action, PageView};
use crate::{
    context::{render_page, PageContext},
    error::PageError,
    flash::FlashMessage,
    forms::{bind_fields, BoundField, FormData, FormError, FormErrors, ModelForm},
    middleware::Viewer,
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use bo_core::{Error, Result};
use bo_db::{Model, Record};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

#[derive(Template)]
#[template(path = "form.html")]
pub(super) struct FormPage {
    pub ctx: PageContext,
    pub title: String,
    pub fields: Vec<BoundField>,
    pub non_field_errors: Vec<String>,
    pub cancel_url: String,
}

impl FormPage {
    pub(super) fn respond(self) -> Result<HttpResponse, PageError> {
        render_page(&self, &self.ctx)
    }
}

pub struct CreateView<F: ModelForm> {
    form: F,
    title: String,
}

pub struct CreateViewBuilder<F: ModelForm> {
    form: Option<F>,
    title: Option<String>,
}

impl<F: ModelForm> CreateView<F> {
    pub fn builder() -> CreateViewBuilder<F> {
        CreateViewBuilder {
            form: None,
            title: None,
        }
    }

    fn page(&self, req: &HttpRequest, state: &AppState, viewer: &Viewer, data: &FormData, errors: &FormErrors) -> FormPage {
        FormPage {
            ctx: PageContext::build(req, state, Some(viewer), &[]),
            title: self.title.clone(),
            fields: bind_fields(&self.form.fields(), data, errors),
            non_field_errors: errors.non_field.clone(),
            cancel_url: collection_url::<F::Model>(state, Action::List).unwrap_or_default(),
        }
    }

    async fn get(&self, req: HttpRequest, state: web::Data<AppState>, viewer: Viewer) -> Result<HttpResponse, PageError> {
        self.page(&req, &state, &viewer, &FormData::new(), &FormErrors::default())
            .respond()
    }

    #[instrument(skip_all, fields(model = F::Model::MODEL_NAME))]
    async fn post(
        &self,
        req: HttpRequest,
        state: web::Data<AppState>,
        viewer: Viewer,
        form: HashMap<String, String>,
    ) -> Result<HttpResponse, PageError> {
        let data = FormData::from(form);
        match self.form.save(state.db.pool(), &data, None).await {
            Ok(instance) => {
                debug!("Created {} {}", F::Model::MODEL_NAME, instance.pk());
                Ok(redirect_with_message(
                    &req,
                    &success_url::<F::Model>(&state, instance.pk()),
                    FlashMessage::success(format!("{} created", instance)),
                ))
            }
            Err(FormError::Invalid(errors)) => {
                debug!("Create form rejected: {:?}", errors);
                self.page(&req, &state, &viewer, &data, &errors).respond()
            }
            Err(FormError::Failed(e)) => Err(e.into()),
        }
    }
}

impl<F: ModelForm> CreateViewBuilder<F> {
    pub fn form(mut self, form: F) -> Self {
        self.form = Some(form);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<CreateView<F>> {
        let form = self.form.ok_or_else(|| {
            Error::Config(format!(
                "Create view for {} has no form",
                F::Model::MODEL_NAME
            ))
        })?;
        Ok(CreateView {
            form,
            title: self
                .title
                .unwrap_or_else(|| format!("Create {}", F::Model::MODEL_NAME)),
        })
    }
}

impl<F: ModelForm> PageView for CreateView<F> {
    fn action(&self) -> Action {
        Action::Create
    }

    fn model_name(&self) -> &'static str {
        F::Model::MODEL_NAME
    }

    fn resource(self: Arc<Self>, path: &str) -> actix_web::Resource {
        let view = Arc::clone(&self);
        web::resource(path)
            .route(web::get().to(
                move |req: HttpRequest, state: web::Data<AppState>, viewer: Viewer| {
                    let view = Arc::clone(&view);
                    async move { view.get(req, state, viewer).await }
                },
            ))
            .route(web::post().to(
                move |req: HttpRequest,
                      state: web::Data<AppState>,
                      viewer: Viewer,
                      form: web::Form<HashMap<String, String>>| {
                    let view = Arc::clone(&self);
                    async move { view.post(req, state, viewer, form.into_inner()).await }
                },
            ))
    }
}
