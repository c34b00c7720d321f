mod client;
mod service;

pub use client::{FeedArticle, FeedPage, NewsApiClient, NewsSource};
pub use service::{external_id_for, NewsService, DEFAULT_QUERY};
