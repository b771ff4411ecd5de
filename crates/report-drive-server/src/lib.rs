//! HTTP surface for report uploads: Microsoft sign-in, cookie sessions and
//! the upload / listing endpoints backed by the `report-drive` library.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub mod config;
pub mod error;
pub mod multipart;
pub mod routes;
pub mod session;
pub mod state;

pub use config::{Cli, ServerConfig};
pub use state::AppState;

/// Room for multipart boundaries and the text fields next to the file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let uploads = Router::new()
        .route("/api/upload", post(routes::upload::session_upload))
        .route("/api/direct-upload", post(routes::upload::direct_upload))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/auth/login", get(routes::auth::login))
        .route("/auth/callback", get(routes::auth::callback))
        .route("/auth/token", get(routes::auth::token))
        .route("/auth/check", get(routes::auth::check))
        .route("/auth/logout", get(routes::auth::logout))
        .route("/api/files", get(routes::files::list_files))
        .merge(uploads)
        .layer(cors_layer(&state.config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT]);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(err) => {
            warn!(error = %err, frontend_url, "frontend URL is not a valid origin, CORS disabled");
            cors
        }
    }
}
