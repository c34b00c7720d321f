use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::Result;

use super::handlers::{self, AppState};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/articles", get(handlers::articles))
        .route("/news", get(handlers::news))
        .route("/votes", get(handlers::votes).post(handlers::post_vote))
        .route("/user-vote", get(handlers::user_vote))
        .route("/analyze-article", post(handlers::analyze_article))
        .route("/guests", post(handlers::register_guest))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Democracy Lens API listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
