//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store, projections, dispatcher)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `covers.rs`: cover-image backfill against the external book catalog

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Router};

use crate::middleware;

pub mod covers;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Upload cap for e-book/audio multipart bodies.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct AppConfig {
    pub jwt_secret: String,
    pub asset_root: PathBuf,
    pub cover_api_url: String,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: AppConfig) -> Router {
    let covers: Arc<dyn covers::CoverSource> =
        Arc::new(covers::HttpCoverSource::new(config.cover_api_url));
    let services = Arc::new(services::build_services(config.asset_root, covers));
    build_router(config.jwt_secret, services)
}

/// Router over pre-built services; tests inject stub collaborators here.
pub fn build_router(jwt_secret: String, services: Arc<services::AppServices>) -> Router {
    let jwt = Arc::new(libram_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
