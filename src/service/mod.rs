//! HTTP service layer built on axum
//!
//! Routes:
//! - `POST /add_batch/` append samples to a symbol
//! - `GET /stats/?symbol=..&k=..` window stats for a symbol
//! - `GET /health` liveness and basic state
//! - `GET /metrics` request and ingest counters

use crate::config::Config;
use crate::validate::{validate_window_exponent, Limits};
use crate::window::WindowStats;
use crate::{StatsEngine, StatsError};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, Router},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

/// Maximum request body size (1MB)
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Default request timeout (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum concurrent requests
const MAX_CONCURRENT_REQUESTS: usize = 1000;

/// HTTP front end for a [`StatsEngine`]
#[derive(Clone)]
pub struct StatsService {
    engine: Arc<StatsEngine>,
    limits: Limits,
    metrics: Arc<ServiceMetrics>,
    start_time: Instant,
    request_timeout: Duration,
    max_body_bytes: usize,
    max_concurrent_requests: usize,
}

/// Body of `POST /add_batch/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Target symbol
    pub symbol: String,
    /// Samples, oldest first
    pub values: Vec<f64>,
}

/// Response to an accepted batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Always `"success"`
    pub status: String,
    /// Human readable summary
    pub message: String,
}

/// Query string of `GET /stats/`
#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    /// Symbol to read
    pub symbol: String,
    /// Window exponent
    pub k: i64,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong
    pub detail: String,
}

/// Response of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since the service was created
    pub uptime_seconds: u64,
    /// Symbols currently tracked
    pub symbols_tracked: usize,
    /// Symbol capacity
    pub max_symbols: usize,
}

/// Response of `GET /metrics`
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Requests handled by the API routes
    pub requests_total: u64,
    /// Requests answered with an error
    pub requests_failed: u64,
    /// Batches accepted
    pub batches_accepted: u64,
    /// Samples ingested
    pub points_ingested: u64,
    /// Stats queries answered
    pub stats_served: u64,
    /// New symbols turned away at capacity
    pub capacity_rejections: u64,
    /// Symbols currently tracked
    pub symbols_tracked: usize,
}

/// Service-specific counters
#[derive(Debug, Default)]
struct ServiceMetrics {
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    batches_accepted: AtomicU64,
    points_ingested: AtomicU64,
    stats_served: AtomicU64,
    capacity_rejections: AtomicU64,
}

impl ServiceMetrics {
    fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_batch(&self, points: usize) {
        self.batches_accepted.fetch_add(1, Ordering::Relaxed);
        self.points_ingested.fetch_add(points as u64, Ordering::Relaxed);
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    /// Engine or validation failure
    Stats(StatsError),
    /// Request could not be decoded into the expected shape
    Malformed(&'static str),
    /// Failure outside the engine, details logged not returned
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::Malformed("Request body must be JSON with a string symbol and a list of numbers")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        ApiError::Malformed("Query must include a symbol and an integer k")
    }
}

impl From<StatsError> for ApiError {
    fn from(e: StatsError) -> Self {
        ApiError::Stats(e)
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &StatsError) -> StatusCode {
    match err {
        StatsError::CapacityExceeded { .. } | StatsError::InvalidWindowExponent(_) => {
            StatusCode::BAD_REQUEST
        }
        StatsError::UnknownKey(_) | StatsError::NoData(_) => StatusCode::NOT_FOUND,
        StatsError::InvalidSymbol(_) | StatsError::InvalidBatch(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Stats(e) => (status_for(&e), e.detail()),
            ApiError::Malformed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.to_string()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl StatsService {
    /// Service with default limits
    pub fn new(engine: Arc<StatsEngine>) -> Self {
        Self {
            engine,
            limits: Limits::default(),
            metrics: Arc::new(ServiceMetrics::default()),
            start_time: Instant::now(),
            request_timeout: DEFAULT_TIMEOUT,
            max_body_bytes: MAX_REQUEST_SIZE,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Service with limits and server settings taken from `config`
    pub fn from_config(engine: Arc<StatsEngine>, config: &Config) -> Self {
        Self {
            limits: config.limits(),
            request_timeout: config.request_timeout(),
            max_body_bytes: config.server.max_body_bytes,
            max_concurrent_requests: config.server.max_concurrent_requests,
            ..Self::new(engine)
        }
    }

    /// Engine behind this service
    pub fn engine(&self) -> &Arc<StatsEngine> {
        &self.engine
    }

    /// Build the router with all middleware applied
    pub fn router(&self) -> Router {
        let app = Router::new()
            .route("/add_batch/", post(Self::add_batch_handler))
            .route("/stats/", get(Self::stats_handler))
            .route("/health", get(Self::health_handler))
            .route("/metrics", get(Self::metrics_handler))
            .with_state(self.clone());

        app.layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(ConcurrencyLimitLayer::new(self.max_concurrent_requests))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    async fn add_batch_handler(
        State(service): State<StatsService>,
        payload: Result<Json<BatchRequest>, JsonRejection>,
    ) -> Result<Json<BatchResponse>, ApiError> {
        let result = match payload {
            Ok(Json(request)) => service.add_batch(request).await,
            Err(rejection) => Err(rejection.into()),
        };
        service.metrics.record_request(result.is_ok());
        result.map(Json)
    }

    async fn add_batch(&self, request: BatchRequest) -> Result<BatchResponse, ApiError> {
        self.limits.symbol(&request.symbol)?;
        self.limits.batch(&request.values)?;

        // The symbol lock may be held by a reader rebuilding the tree; wait for it off the reactor.
        let engine = Arc::clone(&self.engine);
        let BatchRequest { symbol, values } = request;
        let (symbol, result) = tokio::task::spawn_blocking(move || {
            let result = engine.add_batch(&symbol, &values);
            (symbol, result)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("batch task failed: {}", e)))?;

        match result {
            Ok(ack) => {
                self.metrics.record_batch(ack.points_added);
                Ok(BatchResponse {
                    status: "success".to_string(),
                    message: format!("Added {} data points for {}", ack.points_added, symbol),
                })
            }
            Err(e) => {
                if matches!(e, StatsError::CapacityExceeded { .. }) {
                    self.metrics.capacity_rejections.fetch_add(1, Ordering::Relaxed);
                }
                warn!(symbol = %symbol, "Batch rejected: {}", e);
                Err(e.into())
            }
        }
    }

    async fn stats_handler(
        State(service): State<StatsService>,
        query: Result<Query<StatsQuery>, QueryRejection>,
    ) -> Result<Json<WindowStats>, ApiError> {
        let result = match query {
            Ok(Query(query)) => service.stats(query).await,
            Err(rejection) => Err(rejection.into()),
        };
        service.metrics.record_request(result.is_ok());
        if result.is_ok() {
            service.metrics.stats_served.fetch_add(1, Ordering::Relaxed);
        }
        result.map(Json)
    }

    async fn stats(&self, query: StatsQuery) -> Result<WindowStats, ApiError> {
        let k = validate_window_exponent(query.k)?;
        let engine = Arc::clone(&self.engine);

        // A read after a large write burst rebuilds the tree in O(n); keep it off the reactor.
        let stats = tokio::task::spawn_blocking(move || engine.get_stats(&query.symbol, k))
            .await
            .map_err(|e| ApiError::Internal(format!("stats task failed: {}", e)))?;

        match stats {
            Ok(stats) => Ok(stats),
            Err(e) => {
                debug!("Stats request failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn health_handler(State(service): State<StatsService>) -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: service.start_time.elapsed().as_secs(),
            symbols_tracked: service.engine.symbol_count(),
            max_symbols: service.engine.max_symbols(),
        })
    }

    async fn metrics_handler(State(service): State<StatsService>) -> Json<MetricsResponse> {
        let m = &service.metrics;
        Json(MetricsResponse {
            requests_total: m.requests_total.load(Ordering::Relaxed),
            requests_failed: m.requests_failed.load(Ordering::Relaxed),
            batches_accepted: m.batches_accepted.load(Ordering::Relaxed),
            points_ingested: m.points_ingested.load(Ordering::Relaxed),
            stats_served: m.stats_served.load(Ordering::Relaxed),
            capacity_rejections: m.capacity_rejections.load(Ordering::Relaxed),
            symbols_tracked: service.engine.symbol_count(),
        })
    }

    /// Bind `addr` and serve until `shutdown` resolves
    pub async fn serve<F>(
        self,
        addr: SocketAddr,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        info!("Starting tickstats service on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Server error: {}", e);
            return Err(e.into());
        }

        Ok(())
    }
}

/// Resolve once `signal` fires.
///
/// If the signal handler cannot be installed the error is logged and this
/// never resolves, so the server keeps running instead of exiting at startup.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to install shutdown signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
