pub const SCHEMA: &str = r#"
-- articles cache table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    content TEXT,
    source TEXT NOT NULL,
    source_type TEXT NOT NULL DEFAULT 'center',
    published_at TEXT,
    url TEXT NOT NULL,
    image_url TEXT,
    ai_summary TEXT,
    political_score REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_external_id ON articles(external_id);
CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC);

-- guest_users table (anonymous client tokens)
CREATE TABLE IF NOT EXISTS guest_users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guest_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_active_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_guest_users_guest_id ON guest_users(guest_id);

-- article_votes table
-- UNIQUE(article_id, user_id) makes the vote upsert race-free: a concurrent
-- duplicate vote from the same guest lands on the same row.
CREATE TABLE IF NOT EXISTS article_votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES guest_users(id) ON DELETE CASCADE,
    vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(article_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_article_votes_article_id ON article_votes(article_id);
"#;
