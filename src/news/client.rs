use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{AppError, Result};

const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";

/// One article as returned by the external feed, before caching.
#[derive(Debug, Clone)]
pub struct FeedArticle {
    pub source: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A page from the external feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub articles: Vec<FeedArticle>,
    pub total_results: i64,
}

/// External news feed. The live implementation talks to NewsAPI; tests swap
/// in a fake to drive the cache-reconciliation paths.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        from: Option<&str>,
        sort_by: &str,
        page: u32,
        page_size: u32,
    ) -> Result<FeedPage>;
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    message: Option<String>,
    #[serde(rename = "totalResults")]
    total_results: Option<i64>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    source: NewsApiSource,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: String,
    #[serde(rename = "urlToImage")]
    url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

pub struct NewsApiClient {
    client: Client,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("democracy-lens/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { client, api_key }
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn search(
        &self,
        query: &str,
        from: Option<&str>,
        sort_by: &str,
        page: u32,
        page_size: u32,
    ) -> Result<FeedPage> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sortBy", sort_by.to_string()),
            ("pageSize", page_size.to_string()),
            ("page", page.to_string()),
            ("language", "en".to_string()),
            ("apiKey", self.api_key.clone()),
        ];
        if let Some(from) = from {
            params.push(("from", from.to_string()));
        }

        let response = self
            .client
            .get(NEWS_API_URL)
            .query(&params)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited("Too Many Requests".to_string()));
        }

        if !response.status().is_success() {
            return Err(AppError::NewsApi(format!(
                "Feed request failed: HTTP {}",
                response.status()
            )));
        }

        let body: NewsApiResponse = response.json().await?;

        if body.status != "ok" {
            return Err(AppError::NewsApi(
                body.message
                    .unwrap_or_else(|| "Failed to fetch from NewsAPI".to_string()),
            ));
        }

        let articles = body
            .articles
            .into_iter()
            .filter(|a| !a.url.is_empty())
            .map(|a| FeedArticle {
                source: a
                    .source
                    .name
                    .unwrap_or_else(|| "Unknown".to_string()),
                title: a.title.unwrap_or_else(|| "Untitled".to_string()),
                description: a.description.unwrap_or_default(),
                content: a.content,
                url: a.url,
                image_url: a.url_to_image,
                published_at: a.published_at,
            })
            .collect();

        Ok(FeedPage {
            articles,
            total_results: body.total_results.unwrap_or(0),
        })
    }
}
