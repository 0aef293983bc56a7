use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{Collection, DocumentStore, LiveQuery, Snapshot};
use crate::models::{Bookmark, InsightComment, InsightMetric, VoteDirection};

const CHANGE_FEED_CAPACITY: usize = 64;

/// Document store backed by SQLite, announcing every committed write on a broadcast feed.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<Collection>,
}

impl SqliteStore {
    /// Wrap an existing pool. The schema is not touched; call `ensure_schema` first.
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Open (or create) the database file and make sure the collections exist.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = common::init_db_pool(path).await?;
        ensure_schema(&pool).await?;
        info!(path, "document store ready");
        Ok(Self::new(pool))
    }

    /// Private, non-shared store living in memory. Used when no database is configured.
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never recycles, otherwise each new connection
        // would see a fresh empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to create in-memory sqlite pool")?;
        ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn announce(&self, collection: Collection) {
        // No receivers simply means nobody is subscribed yet.
        let _ = self.changes.send(collection);
    }

    async fn bookmarks_of(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query_as::<_, BookmarkRow>(
            r#"
            SELECT id, user_id, news_id, created_at
            FROM bookmarks
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query bookmarks")?;

        rows.into_iter()
            .map(|row| {
                Ok(Bookmark {
                    id: row.id,
                    user_id: row.user_id,
                    news_id: row.news_id,
                    created_at: from_millis(row.created_at)?,
                })
            })
            .collect()
    }

    async fn all_metrics(&self) -> Result<Vec<InsightMetric>> {
        let rows = sqlx::query_as::<_, MetricRow>(
            "SELECT news_id, upvotes, downvotes FROM insight_metrics ORDER BY news_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query insight metrics")?;

        Ok(rows.into_iter().map(InsightMetric::from).collect())
    }

    async fn all_comments(&self) -> Result<Vec<InsightComment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, news_id, text, created_at, author_id, role
            FROM insight_comments
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query insight comments")?;

        rows.into_iter()
            .map(|row| {
                Ok(InsightComment {
                    id: row.id,
                    news_id: row.news_id,
                    text: row.text,
                    created_at: from_millis(row.created_at)?,
                    author_id: row.author_id,
                    role: row.role.parse()?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    async fn snapshot(&self, query: &LiveQuery) -> Result<Snapshot> {
        match query {
            LiveQuery::Bookmarks { user_id } => Ok(Snapshot::Bookmarks(self.bookmarks_of(user_id).await?)),
            LiveQuery::InsightMetrics => Ok(Snapshot::InsightMetrics(self.all_metrics().await?)),
            LiveQuery::InsightComments => Ok(Snapshot::InsightComments(self.all_comments().await?)),
        }
    }

    fn changes(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }

    async fn add_bookmark(&self, user_id: &str, news_id: &str) -> Result<Bookmark> {
        let created_at = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bookmarks (user_id, news_id, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(news_id)
        .bind(created_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert bookmark")?;

        debug!(user_id, news_id, id, "bookmark stored");
        self.announce(Collection::Bookmarks);

        Ok(Bookmark {
            id,
            user_id: user_id.to_string(),
            news_id: news_id.to_string(),
            created_at: from_millis(created_at.timestamp_millis())?,
        })
    }

    async fn remove_bookmarks(&self, user_id: &str, news_id: &str) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND news_id = ?")
            .bind(user_id)
            .bind(news_id)
            .execute(&self.pool)
            .await
            .context("failed to delete bookmarks")?
            .rows_affected();

        debug!(user_id, news_id, removed, "bookmarks deleted");
        self.announce(Collection::Bookmarks);
        Ok(removed)
    }

    async fn increment_metric(&self, news_id: &str, direction: VoteDirection) -> Result<InsightMetric> {
        let (up, down) = match direction {
            VoteDirection::Up => (1i64, 0i64),
            VoteDirection::Down => (0, 1),
        };

        // Single upsert statement: concurrent voters cannot overwrite each other's increments.
        let row = sqlx::query_as::<_, MetricRow>(
            r#"
            INSERT INTO insight_metrics (news_id, upvotes, downvotes, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(news_id) DO UPDATE SET
                upvotes = upvotes + excluded.upvotes,
                downvotes = downvotes + excluded.downvotes,
                updated_at = excluded.updated_at
            RETURNING news_id, upvotes, downvotes
            "#,
        )
        .bind(news_id)
        .bind(up)
        .bind(down)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .context("failed to increment insight metric")?;

        self.announce(Collection::InsightMetrics);
        Ok(row.into())
    }

    async fn append_comment(&self, comment: &InsightComment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO insight_comments (id, news_id, text, created_at, author_id, role)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.news_id)
        .bind(&comment.text)
        .bind(comment.created_at.timestamp_millis())
        .bind(&comment.author_id)
        .bind(comment.role.as_str())
        .execute(&self.pool)
        .await
        .context("failed to insert insight comment")?;

        self.announce(Collection::InsightComments);
        Ok(())
    }
}

/// Create the three collections if they are missing.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            news_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks (user_id, news_id)",
        r#"
        CREATE TABLE IF NOT EXISTS insight_metrics (
            news_id TEXT PRIMARY KEY,
            upvotes INTEGER NOT NULL DEFAULT 0,
            downvotes INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS insight_comments (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            news_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            author_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant'))
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_comments_news ON insight_comments (news_id, created_at)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to create document store schema")?;
    }
    Ok(())
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("invalid timestamp: {}", ms))
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct BookmarkRow {
    id: i64,
    user_id: String,
    news_id: String,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct MetricRow {
    news_id: String,
    upvotes: i64,
    downvotes: i64,
}

impl From<MetricRow> for InsightMetric {
    fn from(row: MetricRow) -> Self {
        Self {
            news_id: row.news_id,
            upvotes: row.upvotes.max(0) as u64,
            downvotes: row.downvotes.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    news_id: String,
    text: String,
    created_at: i64,
    author_id: String,
    role: String,
}
