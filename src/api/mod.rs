pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::sensors::ReadingService;
use handlers::ApiDoc;

pub fn router(service: ReadingService) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/sensors", post(handlers::ingest_reading))
        .route("/api/sensors/latest", get(handlers::get_latest_all))
        .route("/api/sensors/{device_id}/latest", get(handlers::get_latest))
        .route("/api/sensors/{device_id}/history", get(handlers::get_history))
        .route("/api/devices", get(handlers::list_devices))
        .with_state(service)
        .split_for_parts();

    router
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        // The dashboard polls from another origin.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
