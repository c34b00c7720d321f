use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived left/center/right label for an article's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Left,
    Center,
    Right,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Left => "left",
            SourceType::Center => "center",
            SourceType::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(SourceType::Left),
            "center" => Some(SourceType::Center),
            "right" => Some(SourceType::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(VoteType::Up),
            "down" => Some(VoteType::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub source: String,
    pub source_type: SourceType,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    pub image_url: Option<String>,
    pub ai_summary: Option<String>,
    pub political_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a freshly fetched article into the cache.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub source: String,
    pub source_type: SourceType,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    pub image_url: Option<String>,
    pub political_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestUser {
    pub id: i64,
    pub guest_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Article as served to clients: cached row plus derived vote data.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleWithVotes {
    #[serde(flatten)]
    pub article: Article,
    pub votes: VoteCounts,
    #[serde(rename = "userVote")]
    pub user_vote: Option<VoteType>,
}

/// Where the articles in a /news response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsOrigin {
    Cache,
    Api,
    CacheFallback,
}

/// One page of the news read path.
#[derive(Debug, Clone)]
pub struct NewsPage {
    pub articles: Vec<ArticleWithVotes>,
    pub origin: NewsOrigin,
    pub total_results: Option<i64>,
    pub error: Option<String>,
}
