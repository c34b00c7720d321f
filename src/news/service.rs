use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use crate::bias;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Article, ArticleWithVotes, NewArticle, NewsOrigin, NewsPage};

use super::client::{FeedArticle, NewsSource};

/// Query used when the caller supplies none.
pub const DEFAULT_QUERY: &str = "politics OR democracy OR government";

pub const PAGE_SIZE: u32 = 10;

// Max concurrent per-article vote lookups.
const VOTE_LOOKUP_CONCURRENCY: usize = 4;

/// Dedup key for a feed item, derived from its source URL.
pub fn external_id_for(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache-first news read path: serve cached articles when enough match,
/// otherwise hit the live feed and write results through to the cache,
/// degrading back to the cache when the feed fails.
#[derive(Clone)]
pub struct NewsService {
    repo: Repository,
    source: Arc<dyn NewsSource>,
}

impl NewsService {
    pub fn new(repo: Repository, source: Arc<dyn NewsSource>) -> Self {
        Self { repo, source }
    }

    pub async fn fetch_page(
        &self,
        query: &str,
        from: Option<&str>,
        sort_by: &str,
        page: u32,
        guest_id: Option<&str>,
    ) -> Result<NewsPage> {
        let page = page.max(1);
        let offset = (page - 1) * PAGE_SIZE;

        // Step 1: cache first. Half a page of hits is enough to skip the
        // live fetch entirely.
        let cached = self.repo.search_articles(query, from, PAGE_SIZE, offset).await?;
        if cached.len() as u32 >= PAGE_SIZE / 2 {
            tracing::debug!("Serving {} articles from cache for {:?}", cached.len(), query);
            return Ok(NewsPage {
                articles: self.attach_votes(cached, guest_id).await?,
                origin: NewsOrigin::Cache,
                total_results: None,
                error: None,
            });
        }

        // Step 2: live fetch, writing new items through to the cache.
        let effective_query = if query.is_empty() { DEFAULT_QUERY } else { query };

        match self
            .source
            .search(effective_query, from, sort_by, page, PAGE_SIZE)
            .await
        {
            Ok(feed) => {
                let mut articles = Vec::with_capacity(feed.articles.len());
                for item in feed.articles {
                    match self.ingest(item).await {
                        Ok(article) => articles.push(article),
                        Err(e) => tracing::warn!("Skipping feed item: {}", e),
                    }
                }
                Ok(NewsPage {
                    articles: self.attach_votes(articles, guest_id).await?,
                    origin: NewsOrigin::Api,
                    total_results: Some(feed.total_results),
                    error: None,
                })
            }
            // Step 3: any live-fetch failure (rate limits included) degrades
            // to a wider cache query, flagged so the client can tell.
            Err(e) => {
                tracing::warn!("Live feed unavailable, serving cache: {}", e);
                let fallback = self
                    .repo
                    .search_articles(query, from, PAGE_SIZE * 2, offset)
                    .await?;
                Ok(NewsPage {
                    articles: self.attach_votes(fallback, guest_id).await?,
                    origin: NewsOrigin::CacheFallback,
                    total_results: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Cache one feed item, deduplicating on the URL-derived external id.
    async fn ingest(&self, item: FeedArticle) -> Result<Article> {
        let parsed = url::Url::parse(&item.url)
            .map_err(|e| anyhow::anyhow!("Invalid article URL {:?}: {}", item.url, e))?;
        let external_id = external_id_for(parsed.as_str());

        if let Some(existing) = self.repo.get_article_by_external_id(&external_id).await? {
            return Ok(existing);
        }

        let score = bias::heuristic_score(&item.source, &item.title, &item.description);
        self.repo
            .insert_article(NewArticle {
                external_id,
                title: item.title,
                description: item.description,
                content: item.content,
                source: item.source,
                source_type: bias::source_type_for(score),
                published_at: item.published_at,
                url: item.url,
                image_url: item.image_url,
                political_score: score,
            })
            .await
    }

    /// Attach derived vote counts and the requesting guest's own vote to
    /// each article. One lookup per article; fine at page sizes this small.
    async fn attach_votes(
        &self,
        articles: Vec<Article>,
        guest_id: Option<&str>,
    ) -> Result<Vec<ArticleWithVotes>> {
        let user_id = match guest_id.filter(|g| !g.is_empty()) {
            Some(guest_id) => self.repo.find_guest(guest_id).await?.map(|g| g.id),
            None => None,
        };

        let results: Vec<Result<ArticleWithVotes>> = stream::iter(articles)
            .map(|mut article| {
                let repo = self.repo.clone();
                async move {
                    let votes = repo.vote_counts(article.id).await?;
                    let user_vote = match user_id {
                        Some(uid) => repo.user_vote(article.id, uid).await?,
                        None => None,
                    };
                    // Rows cached before scoring existed may lack a score;
                    // fill with the heuristic on the way out.
                    if article.political_score.is_none() {
                        article.political_score = Some(bias::heuristic_score(
                            &article.source,
                            &article.title,
                            &article.description,
                        ));
                    }
                    Ok(ArticleWithVotes {
                        article,
                        votes,
                        user_vote,
                    })
                }
            })
            .buffered(VOTE_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().collect()
    }
}
