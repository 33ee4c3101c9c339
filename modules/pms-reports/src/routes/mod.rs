pub mod handoff;
pub mod metrics;
pub mod report;
pub mod view;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::health::health;
use crate::services::ReportEngine;
use crate::store::ReportStore;

/// Shared state of the report routes
pub struct ReportsState {
    pub engine: Arc<ReportEngine>,
    pub store: ReportStore,
}

/// Report API, HTML pages and handoff routes
pub fn router(state: Arc<ReportsState>) -> Router {
    Router::new()
        .route("/api/report", get(report::get_report))
        .route("/api/reports", post(handoff::store_report))
        .route("/report", get(view::report_form))
        .route("/report/generate", get(view::generate_report_page))
        .route("/report/view/{id}", get(handoff::view_stored_report))
        .with_state(state)
}

/// The complete application: health, metrics and report routes
pub fn app(state: Arc<ReportsState>, metrics_state: Arc<metrics::MetricsState>) -> Router {
    let health_router = Router::new().route("/api/health", get(health));

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::metrics))
        .with_state(metrics_state);

    Router::new()
        .merge(health_router)
        .merge(metrics_router)
        .merge(router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
