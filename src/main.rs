use std::net::SocketAddr;
use std::sync::Arc;

mod ai;
mod api;
mod bias;
mod config;
mod db;
mod error;
mod models;
mod news;

use ai::Analyzer;
use api::AppState;
use config::Config;
use db::Repository;
use error::{AppError, Result};
use news::{NewsApiClient, NewsService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and up by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid bind_addr {:?}: {}", config.bind_addr, e)))?;

    // Open the article cache
    let repo = Repository::new(&config.db_path).await?;
    tracing::info!("Article cache at {}", config.db_path);

    // External collaborators
    let news_api_key = config.news_api_key.clone().unwrap_or_default();
    if news_api_key.is_empty() {
        tracing::warn!("news_api_key not set; live fetches will fail and fall back to cache");
    }
    let news = NewsService::new(repo.clone(), Arc::new(NewsApiClient::new(news_api_key)));

    let analyzer = match config.claude_api_key.clone() {
        Some(key) if !key.is_empty() => Some(Arc::new(Analyzer::new(key))),
        _ => {
            tracing::warn!("claude_api_key not set; article analysis is disabled");
            None
        }
    };

    let state = AppState {
        repo,
        news,
        analyzer,
    };

    api::serve(addr, state).await
}
