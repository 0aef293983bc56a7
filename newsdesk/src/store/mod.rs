use anyhow::Result;
use tokio::sync::broadcast;

use crate::models::{Bookmark, InsightComment, InsightMetric, VoteDirection};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Backend collections observed through live queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Bookmarks,
    InsightMetrics,
    InsightComments,
}

/// A live query over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveQuery {
    /// Bookmarks owned by one identity
    Bookmarks { user_id: String },
    /// Every insight metric, across identities
    InsightMetrics,
    /// Every insight comment, across identities
    InsightComments,
}

impl LiveQuery {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Bookmarks { .. } => Collection::Bookmarks,
            Self::InsightMetrics => Collection::InsightMetrics,
            Self::InsightComments => Collection::InsightComments,
        }
    }
}

/// Complete point-in-time result of a live query.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Bookmarks(Vec<Bookmark>),
    InsightMetrics(Vec<InsightMetric>),
    /// Ordered by timestamp ascending
    InsightComments(Vec<InsightComment>),
}

/// Document-oriented backend the session reads from and writes to.
///
/// Writes must be visible to `snapshot` before the matching collection is
/// announced on the change feed.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run the query once and return its full result.
    async fn snapshot(&self, query: &LiveQuery) -> Result<Snapshot>;

    /// Feed of collections that changed since subscribing.
    fn changes(&self) -> broadcast::Receiver<Collection>;

    async fn add_bookmark(&self, user_id: &str, news_id: &str) -> Result<Bookmark>;

    /// Delete every bookmark document of `user_id` for `news_id`, returning how many were removed.
    async fn remove_bookmarks(&self, user_id: &str, news_id: &str) -> Result<u64>;

    /// Atomically add one vote, creating the metric with zero counts if needed.
    async fn increment_metric(&self, news_id: &str, direction: VoteDirection) -> Result<InsightMetric>;

    async fn append_comment(&self, comment: &InsightComment) -> Result<()>;
}
