use axum::{routing::get, Router};

pub mod catalog;
pub mod common;
pub mod ebooks;
pub mod supplier;
pub mod suppliers;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/catalog", catalog::router())
        .nest("/ebooks", ebooks::router())
        .nest("/suppliers", suppliers::router())
        .nest("/supplier", supplier::router())
}
