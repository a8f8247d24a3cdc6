//! ABOUTME: Observability services including health checks and metrics
//! ABOUTME: Serves liveness, readiness and Prometheus metrics for the backoffice

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use bo_core::{Error, Result};
use bo_db::Db;
use prometheus_client::{
    encoding::{text::encode, EncodeLabelSet},
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

/// Readiness gate that can be toggled to indicate service readiness
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    ready: Arc<AtomicBool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Labels of the request counter
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    /// Status class such as `2xx` or `4xx`
    pub status: String,
}

/// Metrics registry for Prometheus
#[derive(Debug)]
pub struct Metrics {
    registry: Arc<Mutex<Registry>>,
    http_requests_total: Family<RequestLabels, Counter>,
    http_request_duration_seconds: Histogram,
    csv_rows_exported_total: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<RequestLabels, Counter>::default();
        // Counters gain the `_total` suffix when encoded
        registry.register(
            "http_requests",
            "Total number of HTTP requests served by the backoffice",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Histogram::new([0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0].into_iter());
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_request_duration_seconds.clone(),
        );

        let csv_rows_exported_total = Counter::default();
        registry.register(
            "csv_rows_exported",
            "Records written to CSV exports",
            csv_rows_exported_total.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            http_requests_total,
            http_request_duration_seconds,
            csv_rows_exported_total,
        }
    }

    /// Count one finished request and its duration
    pub fn record_request(&self, method: &str, status: u16, duration: f64) {
        self.http_requests_total
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                status: format!("{}xx", status / 100),
            })
            .inc();
        self.http_request_duration_seconds.observe(duration);
    }

    pub fn add_exported_rows(&self, rows: u64) {
        self.csv_rows_exported_total.inc_by(rows);
    }

    pub fn exported_rows(&self) -> u64 {
        self.csv_rows_exported_total.get()
    }

    pub fn encode(&self) -> Result<String> {
        let registry = self
            .registry
            .lock()
            .map_err(|e| Error::Config(format!("Failed to lock metrics registry: {}", e)))?;

        let mut buffer = String::new();
        encode(&mut buffer, &registry)
            .map_err(|e| Error::Config(format!("Failed to encode metrics: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state for observability endpoints
#[derive(Debug, Clone)]
pub struct ObsState {
    pub readiness: ReadinessGate,
    pub metrics: Arc<Metrics>,
    /// Probed by `/readyz` when present
    pub db: Option<Db>,
}

impl ObsState {
    pub fn new() -> Self {
        Self {
            readiness: ReadinessGate::new(),
            metrics: Arc::new(Metrics::new()),
            db: None,
        }
    }

    pub fn with_db(db: Db, metrics: Arc<Metrics>) -> Self {
        Self {
            readiness: ReadinessGate::new(),
            metrics,
            db: Some(db),
        }
    }
}

impl Default for ObsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health endpoint handler
async fn health() -> ActixResult<HttpResponse> {
    tracing::debug!("Health check requested");
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}

/// Readiness endpoint handler
async fn readiness(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    let mut is_ready = state.readiness.is_ready();
    if is_ready {
        if let Some(db) = &state.db {
            if let Err(e) = db.health_check().await {
                tracing::warn!("Database not ready: {}", e);
                is_ready = false;
            }
        }
    }
    tracing::debug!("Readiness check requested, ready: {}", is_ready);

    if is_ready {
        Ok(HttpResponse::Ok().json(json!({
            "status": "ready"
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "not ready"
        })))
    }
}

/// Metrics endpoint handler
async fn metrics(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    tracing::debug!("Metrics scrape requested");

    match state.metrics.encode() {
        Ok(metrics_text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(metrics_text)),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to encode metrics"
            })))
        }
    }
}

/// Create observability service factory
pub fn create_service(
    state: ObsState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(Logger::default())
        .route("/healthz", web::get().to(health))
        .route("/readyz", web::get().to(readiness))
        .route("/metrics", web::get().to(metrics))
}

/// Start observability server
pub async fn start_server(bind_addr: &str, state: ObsState) -> Result<()> {
    tracing::info!("Starting observability server on {}", bind_addr);

    HttpServer::new(move || create_service(state.clone()))
        .bind(bind_addr)
        .map_err(|e| Error::Config(format!("Failed to bind server: {}", e)))?
        .run()
        .await
        .map_err(|e| Error::Config(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(create_service(ObsState::new())).await;

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn test_readiness_follows_gate() {
        let state = ObsState::new();
        state.readiness.set_ready(false);
        let app = test::init_service(create_service(state.clone())).await;

        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "not ready");

        state.readiness.set_ready(true);
        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_readiness_probes_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.db");
        let db = Db::new(path.to_str().unwrap()).await.unwrap();

        let state = ObsState::with_db(db.clone(), Arc::new(Metrics::new()));
        let app = test::init_service(create_service(state)).await;

        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        db.pool().close().await;
        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
    }

    #[actix_web::test]
    async fn test_metrics_endpoint() {
        let state = ObsState::new();
        state.metrics.record_request("GET", 200, 0.02);
        state.metrics.record_request("POST", 302, 0.05);
        state.metrics.add_exported_rows(3);

        let app = test::init_service(create_service(state)).await;
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; version=0.0.4; charset=utf-8"
        );

        let body = test::read_body(resp).await;
        let body_str = std::str::from_utf8(&body).unwrap();
        assert!(body_str.contains("http_requests_total"));
        assert!(body_str.contains("status=\"3xx\""));
        assert!(body_str.contains("http_request_duration_seconds"));
        assert!(body_str.contains("csv_rows_exported_total 3"));
    }

    #[actix_web::test]
    async fn test_exported_rows_accumulate() {
        let metrics = Metrics::new();
        metrics.add_exported_rows(2);
        metrics.add_exported_rows(5);
        assert_eq!(metrics.exported_rows(), 7);
    }
}
