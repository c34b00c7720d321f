use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ai::Analyzer;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, ArticleWithVotes, GuestUser, NewsOrigin, VoteCounts, VoteType};
use crate::news::NewsService;

/// Shared handler state, constructed once in main and cloned per request.
/// No globals: every handler gets its clients injected through here.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub news: NewsService,
    pub analyzer: Option<Arc<Analyzer>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Resolve a client-supplied article identifier: numeric ids are internal,
/// anything else is tried as an external (dedup) id.
async fn resolve_article(repo: &Repository, id: &str) -> Result<Option<Article>> {
    if let Ok(internal) = id.parse::<i64>() {
        if let Some(article) = repo.get_article(internal).await? {
            return Ok(Some(article));
        }
    }
    repo.get_article_by_external_id(id).await
}

// GET /articles

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub id: Option<String>,
}

pub async fn articles(
    State(state): State<AppState>,
    Query(params): Query<ArticlesQuery>,
) -> Result<Response> {
    match params.id {
        Some(id) => {
            let article = resolve_article(&state.repo, &id)
                .await?
                .ok_or_else(|| AppError::NotFound("Article not found".to_string()))?;
            Ok(ApiResponse::ok(article).into_response())
        }
        None => {
            let articles = state.repo.list_articles(10, 0).await?;
            Ok(ApiResponse::ok(articles).into_response())
        }
    }
}

// GET /news

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub q: String,
    pub from: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "guestId")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub success: bool,
    pub data: Vec<ArticleWithVotes>,
    pub source: NewsOrigin,
    #[serde(rename = "totalResults", skip_serializing_if = "Option::is_none")]
    pub total_results: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn news(
    State(state): State<AppState>,
    Query(params): Query<NewsQuery>,
) -> Result<Json<NewsResponse>> {
    let page = state
        .news
        .fetch_page(
            &params.q,
            params.from.as_deref(),
            params.sort_by.as_deref().unwrap_or("publishedAt"),
            params.page.unwrap_or(1),
            params.guest_id.as_deref(),
        )
        .await?;

    Ok(Json(NewsResponse {
        success: true,
        data: page.articles,
        source: page.origin,
        total_results: page.total_results,
        error: page.error,
    }))
}

// POST /votes

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "articleId")]
    pub article_id: Option<i64>,
    #[serde(rename = "guestId")]
    pub guest_id: Option<String>,
    #[serde(rename = "voteType")]
    pub vote_type: Option<VoteType>,
}

#[derive(Debug, Serialize)]
pub struct VoteResult {
    pub votes: VoteCounts,
    #[serde(rename = "userVote")]
    pub user_vote: Option<VoteType>,
}

pub async fn post_vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<ApiResponse<VoteResult>>> {
    let article_id = req
        .article_id
        .ok_or_else(|| AppError::BadRequest("Missing required fields".to_string()))?;
    let guest_id = req
        .guest_id
        .filter(|g| !g.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required fields".to_string()))?;

    state
        .repo
        .get_article(article_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Article not found".to_string()))?;

    let user_vote = state
        .repo
        .apply_vote(article_id, &guest_id, req.vote_type)
        .await?;
    let votes = state.repo.vote_counts(article_id).await?;

    Ok(ApiResponse::ok(VoteResult { votes, user_vote }))
}

// GET /votes

#[derive(Debug, Deserialize)]
pub struct VotesQuery {
    #[serde(rename = "articleId")]
    pub article_id: Option<String>,
}

pub async fn votes(
    State(state): State<AppState>,
    Query(params): Query<VotesQuery>,
) -> Result<Json<ApiResponse<VoteCounts>>> {
    let article_id = params
        .article_id
        .ok_or_else(|| AppError::BadRequest("Missing articleId parameter".to_string()))?;

    // Unknown articles simply have zero votes.
    let counts = match resolve_article(&state.repo, &article_id).await? {
        Some(article) => state.repo.vote_counts(article.id).await?,
        None => VoteCounts::default(),
    };

    Ok(ApiResponse::ok(counts))
}

// GET /user-vote

#[derive(Debug, Deserialize)]
pub struct UserVoteQuery {
    #[serde(rename = "articleId")]
    pub article_id: Option<String>,
    #[serde(rename = "guestId")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserVoteResult {
    #[serde(rename = "voteType")]
    pub vote_type: Option<VoteType>,
}

pub async fn user_vote(
    State(state): State<AppState>,
    Query(params): Query<UserVoteQuery>,
) -> Result<Json<ApiResponse<UserVoteResult>>> {
    let (article_id, guest_id) = match (params.article_id, params.guest_id) {
        (Some(a), Some(g)) if !g.is_empty() => (a, g),
        _ => {
            return Err(AppError::BadRequest(
                "Missing required parameters".to_string(),
            ))
        }
    };

    let article = resolve_article(&state.repo, &article_id).await?;
    let guest = state.repo.find_guest(&guest_id).await?;

    let vote_type = match (article, guest) {
        (Some(article), Some(guest)) => state.repo.user_vote(article.id, guest.id).await?,
        _ => None,
    };

    Ok(ApiResponse::ok(UserVoteResult { vote_type }))
}

// POST /analyze-article

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "articleId")]
    pub article_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(rename = "politicalScore")]
    pub political_score: f64,
}

pub async fn analyze_article(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AnalysisResult>>> {
    let article_id = req
        .article_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing articleId".to_string()))?;

    let analyzer = state
        .analyzer
        .as_ref()
        .ok_or_else(|| AppError::Config("claude_api_key is not configured".to_string()))?;

    let article = resolve_article(&state.repo, &article_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Article not found".to_string()))?;

    // Fresh analysis on every call; the result overwrites the previous one.
    let (summary, score) = analyzer.analyze(&article).await?;
    let score = score.value();

    state
        .repo
        .update_article_analysis(article.id, summary.clone(), score)
        .await?;

    Ok(ApiResponse::ok(AnalysisResult {
        summary,
        political_score: score,
    }))
}

// POST /guests

#[derive(Debug, Deserialize)]
pub struct GuestRequest {
    #[serde(rename = "guestId")]
    pub guest_id: Option<String>,
}

pub async fn register_guest(
    State(state): State<AppState>,
    Json(req): Json<GuestRequest>,
) -> Result<Json<ApiResponse<GuestUser>>> {
    let guest_id = req
        .guest_id
        .filter(|g| !g.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing guestId".to_string()))?;

    let guest = state.repo.get_or_create_guest(&guest_id).await?;
    Ok(ApiResponse::ok(guest))
}

// GET /health

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewArticle, SourceType};
    use crate::news::NewsSource;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Feed that always fails; handler tests never reach the live path.
    struct DownSource;

    #[async_trait]
    impl NewsSource for DownSource {
        async fn search(
            &self,
            _query: &str,
            _from: Option<&str>,
            _sort_by: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<crate::news::FeedPage> {
            Err(AppError::RateLimited("Too Many Requests".to_string()))
        }
    }

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("api.db");
        let repo = Repository::new(db_path.to_str().unwrap()).await.unwrap();
        let news = NewsService::new(repo.clone(), Arc::new(DownSource));
        let state = AppState {
            repo,
            news,
            analyzer: None,
        };
        (state, dir)
    }

    async fn seed_article(state: &AppState) -> Article {
        state
            .repo
            .insert_article(NewArticle {
                external_id: "ext1".to_string(),
                title: "Debate recap".to_string(),
                description: "Highlights from last night".to_string(),
                content: None,
                source: "BBC".to_string(),
                source_type: SourceType::Center,
                published_at: Some(Utc::now()),
                url: "https://example.com/debate".to_string(),
                image_url: None,
                political_score: -1.2,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn vote_endpoint_toggles_on_repeat() {
        let (state, _dir) = test_state().await;
        let article = seed_article(&state).await;

        let first = post_vote(
            State(state.clone()),
            Json(VoteRequest {
                article_id: Some(article.id),
                guest_id: Some("guest_1".to_string()),
                vote_type: Some(VoteType::Up),
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.0.data.user_vote, Some(VoteType::Up));
        assert_eq!(first.0.data.votes.upvotes, 1);

        let second = post_vote(
            State(state),
            Json(VoteRequest {
                article_id: Some(article.id),
                guest_id: Some("guest_1".to_string()),
                vote_type: Some(VoteType::Up),
            }),
        )
        .await
        .unwrap();
        assert_eq!(second.0.data.user_vote, None);
        assert_eq!(second.0.data.votes.upvotes, 0);
    }

    #[tokio::test]
    async fn vote_endpoint_rejects_missing_fields() {
        let (state, _dir) = test_state().await;

        let err = post_vote(
            State(state),
            Json(VoteRequest {
                article_id: None,
                guest_id: Some("guest_1".to_string()),
                vote_type: Some(VoteType::Up),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn votes_endpoint_reports_zero_for_unknown_article() {
        let (state, _dir) = test_state().await;

        let response = votes(
            State(state),
            Query(VotesQuery {
                article_id: Some("999".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.0.data, VoteCounts::default());
    }

    #[tokio::test]
    async fn user_vote_endpoint_is_null_for_unknown_guest() {
        let (state, _dir) = test_state().await;
        let article = seed_article(&state).await;

        let response = user_vote(
            State(state),
            Query(UserVoteQuery {
                article_id: Some(article.id.to_string()),
                guest_id: Some("nobody".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.0.data.vote_type, None);
    }

    #[tokio::test]
    async fn articles_endpoint_resolves_external_ids() {
        let (state, _dir) = test_state().await;
        let article = seed_article(&state).await;

        // Internal id.
        assert!(articles(
            State(state.clone()),
            Query(ArticlesQuery {
                id: Some(article.id.to_string())
            })
        )
        .await
        .is_ok());

        // External id.
        assert!(articles(
            State(state.clone()),
            Query(ArticlesQuery {
                id: Some("ext1".to_string())
            })
        )
        .await
        .is_ok());

        let err = articles(
            State(state),
            Query(ArticlesQuery {
                id: Some("missing".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn news_endpoint_marks_degraded_responses() {
        let (state, _dir) = test_state().await;

        // Empty cache and a rate-limited feed: degraded but not an error.
        let response = news(
            State(state),
            Query(NewsQuery {
                q: "anything".to_string(),
                from: None,
                sort_by: None,
                page: None,
                guest_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.0.source, NewsOrigin::CacheFallback);
        assert!(response.0.error.is_some());
        assert!(response.0.data.is_empty());
    }

    #[tokio::test]
    async fn guest_registration_is_idempotent() {
        let (state, _dir) = test_state().await;

        let first = register_guest(
            State(state.clone()),
            Json(GuestRequest {
                guest_id: Some("guest_a".to_string()),
            }),
        )
        .await
        .unwrap();
        let second = register_guest(
            State(state),
            Json(GuestRequest {
                guest_id: Some("guest_a".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.0.data.id, second.0.data.id);
    }
}
