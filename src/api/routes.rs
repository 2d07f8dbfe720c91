use crate::api::handlers::{health, ingest, readings, scheduler, status};
use crate::api::AppState;
use axum::{
    extract::Request,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let api_routes = Router::new()
        .route("/api/v1/readings/latest", get(readings::get_latest))
        .route("/api/v1/readings/history", get(readings::get_history))
        .route(
            "/api/v1/readings/daily-summary",
            get(readings::get_daily_summary),
        )
        .route("/api/v1/ingest", post(ingest::ingest_payload))
        .route("/api/v1/ingest/run", post(ingest::run_once))
        .route("/api/v1/scheduler/status", get(scheduler::get_status))
        .route("/api/v1/scheduler/start", post(scheduler::start))
        .route("/api/v1/scheduler/stop", post(scheduler::stop))
        .route("/api/v1/status", get(status::get_status));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |_response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::INFO, latency = ?latency, "request completed");
                    },
                )
                .on_failure(
                    |_error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, "request failed");
                    },
                ),
        )
}
