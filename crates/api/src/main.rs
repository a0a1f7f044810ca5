use std::path::PathBuf;

use libram_api::app::{build_app, AppConfig};

#[tokio::main]
async fn main() {
    libram_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set, using development secret");
        "dev-secret".to_string()
    });
    let asset_root =
        PathBuf::from(std::env::var("LIBRAM_ASSET_ROOT").unwrap_or_else(|_| "assets".to_string()));
    let cover_api_url = std::env::var("COVER_API_URL")
        .unwrap_or_else(|_| "https://www.googleapis.com/books/v1/volumes".to_string());

    let app = build_app(AppConfig {
        jwt_secret,
        asset_root,
        cover_api_url,
    });

    let addr = std::env::var("LIBRAM_LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!(%addr, "starting libram api");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app).await.expect("server error");
}
