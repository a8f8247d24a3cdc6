//! ABOUTME: Server-rendered backoffice with generic CRUD views and CSV export
//! ABOUTME: Registers resources, names their routes and builds the actix application

use actix_web::{
    dev::Service as _,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use bo_config::{BackofficeSettings, SecurityConfig};
use bo_core::{Error, MonotonicTimer, Result};
use bo_db::{is_safe_sql_identifier, Db};
use bo_obs::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

pub mod auth;
pub mod context;
pub mod error;
pub mod export;
pub mod filters;
pub mod flash;
pub mod forms;
pub mod middleware;
pub mod render;
pub mod sidebar;
pub mod urls;
pub mod views;

use middleware::RequireLogin;
use urls::{actix_path, UrlResolver};
use views::{IndexView, PageView, StatisticsProvider};

/// Application state shared across all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Db,
    pub settings: Arc<BackofficeSettings>,
    pub security: SecurityConfig,
    pub urls: Arc<UrlResolver>,
    pub metrics: Arc<Metrics>,
    /// Maximum urlencoded form body in bytes
    pub form_limit: usize,
}

/// Views of one model mounted under a plural path segment such as `users`
pub struct ResourceViews {
    segment: String,
    views: Vec<Arc<dyn PageView>>,
}

impl ResourceViews {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            views: Vec::new(),
        }
    }

    pub fn view(mut self, view: impl PageView) -> Self {
        self.views.push(Arc::new(view));
        self
    }
}

/// Named route with its public pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub pattern: String,
}

/// The set of resources and dashboard figures making up a backoffice
#[derive(Clone)]
pub struct Backoffice {
    settings: Arc<BackofficeSettings>,
    resources: Vec<Arc<ResourceViews>>,
    statistics: Vec<Arc<dyn StatisticsProvider>>,
}

impl Backoffice {
    pub fn new(settings: BackofficeSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            resources: Vec::new(),
            statistics: Vec::new(),
        }
    }

    pub fn resource(mut self, resource: ResourceViews) -> Self {
        self.resources.push(Arc::new(resource));
        self
    }

    pub fn statistics(mut self, provider: impl StatisticsProvider + 'static) -> Self {
        self.statistics.push(Arc::new(provider));
        self
    }

    pub fn settings(&self) -> Arc<BackofficeSettings> {
        Arc::clone(&self.settings)
    }

    fn prefix(&self) -> String {
        format!("/{}", self.settings.url_namespace)
    }

    /// Every named route, in registration order
    pub fn routes(&self) -> Result<Vec<Route>> {
        let prefix = self.prefix();
        let route = |name: &str, pattern: String| Route {
            name: self.settings.route_name(name),
            pattern,
        };

        let mut routes = vec![
            route("index", format!("{}/", prefix)),
            route("sign-in", format!("{}/auth/sign-in/", prefix)),
            route("sign-out", format!("{}/auth/sign-out/", prefix)),
        ];
        for resource in &self.resources {
            let segment = resource.segment.trim_matches('/');
            if !segment.split('/').all(|part| is_safe_sql_identifier(&part.replace('-', "_"))) {
                return Err(Error::Config(format!(
                    "Invalid resource segment '{}'",
                    resource.segment
                )));
            }
            for view in &resource.views {
                view.validate()?;
                let action = view.action();
                routes.push(route(
                    &format!("{}-{}", view.model_name(), action.name()),
                    format!("{}/{}/{}", prefix, segment, action.suffix()),
                ));
            }
        }
        Ok(routes)
    }

    /// Resolver for every route; duplicated names are a configuration error
    pub fn url_resolver(&self) -> Result<UrlResolver> {
        let mut urls = UrlResolver::new();
        for route in self.routes()? {
            urls.register(&route.name, &route.pattern)?;
        }
        Ok(urls)
    }

    /// State for the application serving this backoffice
    pub fn app_state(
        &self,
        db: Db,
        security: SecurityConfig,
        metrics: Arc<Metrics>,
        form_limit: usize,
    ) -> Result<AppState> {
        Ok(AppState {
            db,
            settings: self.settings(),
            security,
            urls: Arc::new(self.url_resolver()?),
            metrics,
            form_limit,
        })
    }

    /// Mount sign-in publicly and everything else behind `RequireLogin`
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        let prefix = self.prefix();

        // Matched before the protected scope below
        cfg.service(
            web::resource(format!("{}/auth/sign-in/", prefix))
                .route(web::get().to(views::sign_in_page))
                .route(web::post().to(views::sign_in)),
        );

        let index = Arc::new(IndexView::new(self.statistics.clone()));
        let mut scope = web::scope(&prefix)
            .service(index.resource("/"))
            .service(
                web::resource("/auth/sign-out/")
                    .route(web::get().to(views::sign_out))
                    .route(web::post().to(views::sign_out)),
            );
        for resource in &self.resources {
            let segment = resource.segment.trim_matches('/');
            for view in &resource.views {
                let path = actix_path(&format!("/{}/{}", segment, view.action().suffix()));
                debug!("Mounting {} {} at {}", view.model_name(), view.action().name(), path);
                scope = scope.service(Arc::clone(view).resource(&path));
            }
        }
        cfg.service(scope.wrap(RequireLogin));
    }
}

/// Default security headers for every page
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Frame-Options", "DENY"))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "same-origin"))
        .add(("Cache-Control", "no-store"))
}

/// Create the backoffice application service factory
pub fn create_app(
    state: AppState,
    backoffice: Backoffice,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let metrics = Arc::clone(&state.metrics);
    let form_limit = state.form_limit;

    App::new()
        .app_data(web::Data::new(state))
        .app_data(web::FormConfig::default().limit(form_limit))
        .wrap(security_headers())
        .wrap(Logger::default())
        .wrap_fn(move |req, srv| {
            let metrics = Arc::clone(&metrics);
            let method = req.method().to_string();
            let timer = MonotonicTimer::new();
            let response = srv.call(req);
            async move {
                let response = response.await?;
                metrics.record_request(
                    &method,
                    response.status().as_u16(),
                    timer.elapsed().as_secs_f64(),
                );
                Ok(response)
            }
        })
        .configure(|cfg| backoffice.configure(cfg))
}

/// Start the web server
pub async fn start_server(bind_addr: &str, state: AppState, backoffice: Backoffice) -> Result<()> {
    info!("Starting backoffice on {}", bind_addr);

    HttpServer::new(move || create_app(state.clone(), backoffice.clone()))
        .bind(bind_addr)
        .map_err(|e| Error::Config(format!("Failed to bind web server: {}", e)))?
        .run()
        .await
        .map_err(|e| Error::Config(format!("Web server error: {}", e)))?;

    Ok(())
}
