use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Service info
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))

        // Analysis tasks
        .route("/analyze", post(handlers::analyze))
        .route("/suggest", post(handlers::suggest))
        .route("/explain", post(handlers::explain))
        .route("/security", post(handlers::security))

        // Raw generation
        .route("/generate", post(handlers::generate))

        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(tower_http::cors::Any)
                        .allow_methods(tower_http::cors::Any)
                        .allow_headers(tower_http::cors::Any),
                ),
        )
}
