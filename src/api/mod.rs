pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aggregate::AggregationService, directory::DeviceDirectory, store::ReadingStore,
};
use handlers::ApiDoc;

/// Shared per-request state. Every member is a cheap clone over the same
/// pool and cache, constructed once in `main` and injected here — no
/// process-global handles.
#[derive(Clone)]
pub struct AppState {
    pub directory: DeviceDirectory,
    pub store: ReadingStore,
    pub aggregator: AggregationService,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/", post(handlers::ingest_reading))
        .route("/batch", post(handlers::ingest_batch))
        .route("/device/{device_id}", get(handlers::get_device_readings))
        .route(
            "/device/{device_id}/summary",
            get(handlers::get_device_summary),
        )
        .route(
            "/device/{device_id}/hourly",
            get(handlers::get_device_hourly),
        )
        .route(
            "/device/{device_id}/telemetry",
            delete(handlers::delete_device_telemetry),
        )
        .route("/user/{user_id}/devices", get(handlers::get_user_devices))
        .route("/user/{user_id}/summary", get(handlers::get_user_summary))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
