use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, GuestUser, NewArticle, SourceType, VoteCounts, VoteType};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, external_id, title, description, content, source, source_type, \
     published_at, url, image_url, ai_summary, political_score, created_at";

/// Async SQLite repository. Cheap to clone; the underlying connection is
/// shared and serializes access internally.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Article operations

    /// Insert an article if its external_id is unseen, returning the cached
    /// row either way. Two fetches of the same source URL resolve to the
    /// same row.
    pub async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let article = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles
                           (external_id, title, description, content, source, source_type,
                            published_at, url, image_url, political_score)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                       ON CONFLICT(external_id) DO NOTHING"#,
                    params![
                        article.external_id,
                        article.title,
                        article.description,
                        article.content,
                        article.source,
                        article.source_type.as_str(),
                        article.published_at.map(|dt| dt.to_rfc3339()),
                        article.url,
                        article.image_url,
                        article.political_score,
                    ],
                )?;

                let row = conn.query_row(
                    &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE external_id = ?1"),
                    params![article.external_id],
                    |row| Ok(article_from_row(row)),
                )?;
                Ok(row)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
                        params![id],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article_by_external_id(&self, external_id: &str) -> Result<Option<Article>> {
        let external_id = external_id.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE external_id = ?1"),
                        params![external_id],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn list_articles(&self, limit: u32, offset: u32) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     ORDER BY published_at DESC NULLS LAST, created_at DESC
                     LIMIT ?1 OFFSET ?2"
                ))?;
                let articles = stmt
                    .query_map(params![limit, offset], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Search the cache by substring over title/description with an optional
    /// published-at lower bound. All sort modes collapse to recency.
    pub async fn search_articles(
        &self,
        query: &str,
        from: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", query);
        let from = from.unwrap_or_default().to_string();
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE (title LIKE ?1 OR description LIKE ?1)
                       AND (?2 = '' OR published_at >= ?2)
                     ORDER BY published_at DESC NULLS LAST, created_at DESC
                     LIMIT ?3 OFFSET ?4"
                ))?;
                let articles = stmt
                    .query_map(params![pattern, from, limit, offset], |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Overwrite the AI analysis fields. Every analysis run replaces the
    /// previous one.
    pub async fn update_article_analysis(
        &self,
        id: i64,
        summary: String,
        score: f64,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET ai_summary = ?1, political_score = ?2 WHERE id = ?3",
                    params![summary, score, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Guest operations

    /// Insert a guest on first contact, touch last_active_at on every later
    /// one, and return the row.
    pub async fn get_or_create_guest(&self, guest_id: &str) -> Result<GuestUser> {
        let guest_id = guest_id.to_string();
        let guest = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO guest_users (guest_id) VALUES (?1)
                       ON CONFLICT(guest_id) DO UPDATE SET last_active_at = datetime('now')"#,
                    params![guest_id],
                )?;
                let guest = conn.query_row(
                    "SELECT id, guest_id, created_at, last_active_at FROM guest_users WHERE guest_id = ?1",
                    params![guest_id],
                    |row| Ok(guest_from_row(row)),
                )?;
                Ok(guest)
            })
            .await?;
        Ok(guest)
    }

    pub async fn find_guest(&self, guest_id: &str) -> Result<Option<GuestUser>> {
        let guest_id = guest_id.to_string();
        let guest = self
            .conn
            .call(move |conn| {
                let guest = conn
                    .query_row(
                        "SELECT id, guest_id, created_at, last_active_at FROM guest_users WHERE guest_id = ?1",
                        params![guest_id],
                        |row| Ok(guest_from_row(row)),
                    )
                    .optional()?;
                Ok(guest)
            })
            .await?;
        Ok(guest)
    }

    // Vote operations

    /// Aggregate counts are derived by counting rows, never stored.
    pub async fn vote_counts(&self, article_id: i64) -> Result<VoteCounts> {
        let counts = self
            .conn
            .call(move |conn| {
                let counts = conn.query_row(
                    r#"SELECT
                           COUNT(*) FILTER (WHERE vote_type = 'up'),
                           COUNT(*) FILTER (WHERE vote_type = 'down')
                       FROM article_votes WHERE article_id = ?1"#,
                    params![article_id],
                    |row| {
                        Ok(VoteCounts {
                            upvotes: row.get(0)?,
                            downvotes: row.get(1)?,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    pub async fn user_vote(&self, article_id: i64, user_id: i64) -> Result<Option<VoteType>> {
        let vote = self
            .conn
            .call(move |conn| {
                let vote = conn
                    .query_row(
                        "SELECT vote_type FROM article_votes WHERE article_id = ?1 AND user_id = ?2",
                        params![article_id, user_id],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(vote.and_then(|s| VoteType::parse(&s)))
            })
            .await?;
        Ok(vote)
    }

    /// Race-free thanks to UNIQUE(article_id, user_id): a concurrent vote
    /// from the same guest updates the same row instead of inserting twice.
    pub async fn upsert_vote(
        &self,
        article_id: i64,
        user_id: i64,
        vote_type: VoteType,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO article_votes (article_id, user_id, vote_type)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(article_id, user_id) DO UPDATE SET
                           vote_type = excluded.vote_type,
                           updated_at = datetime('now')"#,
                    params![article_id, user_id, vote_type.as_str()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Idempotent: succeeds whether or not a row existed.
    pub async fn clear_vote(&self, article_id: i64, user_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM article_votes WHERE article_id = ?1 AND user_id = ?2",
                    params![article_id, user_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Apply one vote submission and return the guest's resulting vote.
    ///
    /// Toggle semantics: re-submitting the current vote type retracts it,
    /// a different type updates the row in place, an absent type clears it.
    pub async fn apply_vote(
        &self,
        article_id: i64,
        guest_id: &str,
        vote_type: Option<VoteType>,
    ) -> Result<Option<VoteType>> {
        let guest = self.get_or_create_guest(guest_id).await?;
        let existing = self.user_vote(article_id, guest.id).await?;

        match vote_type {
            None => {
                self.clear_vote(article_id, guest.id).await?;
                Ok(None)
            }
            Some(vote) if existing == Some(vote) => {
                self.clear_vote(article_id, guest.id).await?;
                Ok(None)
            }
            Some(vote) => {
                self.upsert_vote(article_id, guest.id, vote).await?;
                Ok(Some(vote))
            }
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        external_id: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        description: row.get(3).unwrap(),
        content: row.get(4).unwrap(),
        source: row.get(5).unwrap(),
        source_type: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| SourceType::parse(&s))
            .unwrap_or(SourceType::Center),
        published_at: row
            .get::<_, Option<String>>(7)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        url: row.get(8).unwrap(),
        image_url: row.get(9).unwrap(),
        ai_summary: row.get(10).unwrap(),
        political_score: row.get(11).unwrap(),
        created_at: row
            .get::<_, String>(12)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn guest_from_row(row: &Row) -> GuestUser {
    GuestUser {
        id: row.get(0).unwrap(),
        guest_id: row.get(1).unwrap(),
        created_at: row
            .get::<_, String>(2)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_active_at: row
            .get::<_, String>(3)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let repo = Repository::new(db_path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    fn sample_article(external_id: &str) -> NewArticle {
        NewArticle {
            external_id: external_id.to_string(),
            title: "Senate passes budget".to_string(),
            description: "A budget bill passed the Senate today".to_string(),
            content: None,
            source: "Reuters".to_string(),
            source_type: SourceType::Center,
            published_at: Some(Utc::now()),
            url: "https://example.com/budget".to_string(),
            image_url: None,
            political_score: 0.3,
        }
    }

    #[tokio::test]
    async fn duplicate_external_id_resolves_to_same_row() {
        let (repo, _dir) = test_repo().await;

        let first = repo.insert_article(sample_article("abc123")).await.unwrap();
        let second = repo.insert_article(sample_article("abc123")).await.unwrap();

        assert_eq!(first.id, second.id);
        let all = repo.list_articles(10, 0).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn vote_toggle_retracts_on_same_type() {
        let (repo, _dir) = test_repo().await;
        let article = repo.insert_article(sample_article("a1")).await.unwrap();

        let vote = repo
            .apply_vote(article.id, "guest_1", Some(VoteType::Up))
            .await
            .unwrap();
        assert_eq!(vote, Some(VoteType::Up));
        assert_eq!(repo.vote_counts(article.id).await.unwrap().upvotes, 1);

        // Same type again retracts.
        let vote = repo
            .apply_vote(article.id, "guest_1", Some(VoteType::Up))
            .await
            .unwrap();
        assert_eq!(vote, None);
        assert_eq!(
            repo.vote_counts(article.id).await.unwrap(),
            VoteCounts::default()
        );
    }

    #[tokio::test]
    async fn vote_change_is_last_writer_wins() {
        let (repo, _dir) = test_repo().await;
        let article = repo.insert_article(sample_article("a2")).await.unwrap();

        repo.apply_vote(article.id, "guest_1", Some(VoteType::Up))
            .await
            .unwrap();
        let vote = repo
            .apply_vote(article.id, "guest_1", Some(VoteType::Down))
            .await
            .unwrap();
        assert_eq!(vote, Some(VoteType::Down));

        let counts = repo.vote_counts(article.id).await.unwrap();
        assert_eq!(counts.upvotes, 0);
        assert_eq!(counts.downvotes, 1);

        let guest = repo.find_guest("guest_1").await.unwrap().unwrap();
        assert_eq!(
            repo.user_vote(article.id, guest.id).await.unwrap(),
            Some(VoteType::Down)
        );
    }

    #[tokio::test]
    async fn clear_vote_is_idempotent() {
        let (repo, _dir) = test_repo().await;
        let article = repo.insert_article(sample_article("a3")).await.unwrap();

        // No vote exists yet; clearing must still succeed.
        let vote = repo.apply_vote(article.id, "guest_1", None).await.unwrap();
        assert_eq!(vote, None);
        let vote = repo.apply_vote(article.id, "guest_1", None).await.unwrap();
        assert_eq!(vote, None);
    }

    #[tokio::test]
    async fn counts_match_guests_with_active_votes() {
        let (repo, _dir) = test_repo().await;
        let article = repo.insert_article(sample_article("a4")).await.unwrap();

        repo.apply_vote(article.id, "g1", Some(VoteType::Up))
            .await
            .unwrap();
        repo.apply_vote(article.id, "g2", Some(VoteType::Up))
            .await
            .unwrap();
        repo.apply_vote(article.id, "g3", Some(VoteType::Down))
            .await
            .unwrap();
        // g2 retracts via toggle.
        repo.apply_vote(article.id, "g2", Some(VoteType::Up))
            .await
            .unwrap();

        let counts = repo.vote_counts(article.id).await.unwrap();
        assert_eq!(counts.upvotes + counts.downvotes, 2);
        assert_eq!(counts.upvotes, 1);
        assert_eq!(counts.downvotes, 1);
    }

    #[tokio::test]
    async fn search_matches_title_and_description() {
        let (repo, _dir) = test_repo().await;
        repo.insert_article(sample_article("s1")).await.unwrap();

        let mut other = sample_article("s2");
        other.title = "Local sports roundup".to_string();
        other.description = "Weekend scores".to_string();
        repo.insert_article(other).await.unwrap();

        let hits = repo.search_articles("budget", None, 10, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_id, "s1");

        // Empty query matches everything.
        let hits = repo.search_articles("", None, 10, 0).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn analysis_update_overwrites_fields() {
        let (repo, _dir) = test_repo().await;
        let article = repo.insert_article(sample_article("an1")).await.unwrap();

        repo.update_article_analysis(article.id, "A summary.".to_string(), -4.2)
            .await
            .unwrap();

        let updated = repo.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(updated.ai_summary.as_deref(), Some("A summary."));
        assert_eq!(updated.political_score, Some(-4.2));
    }

    #[tokio::test]
    async fn guest_is_created_once_and_touched_after() {
        let (repo, _dir) = test_repo().await;

        let first = repo.get_or_create_guest("guest_xyz").await.unwrap();
        let second = repo.get_or_create_guest("guest_xyz").await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(repo.find_guest("unseen").await.unwrap().is_none());
    }
}
