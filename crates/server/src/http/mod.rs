use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{AppState, routes};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::chat::router())
        .merge(routes::site::router())
        .merge(routes::images::router())
        // The generated site and uploaded blobs are also plain static
        // files, so the preview iframe can load them directly.
        .nest_service("/portfolio", ServeDir::new(state.site_dir()))
        .nest_service("/uploads", ServeDir::new(state.uploads_dir()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
