use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

use crate::models::{Bookmark, InsightComment, InsightMetric};
use crate::store::Snapshot;
use crate::view::preferences::CategoryPreferences;

/// Top-level tabs of the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    All,
    Recommended,
    Bookmarks,
    /// Category preference editor; shows no news list
    Management,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Recommended => "recommended",
            Self::Bookmarks => "bookmarks",
            Self::Management => "management",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "recommended" => Ok(Self::Recommended),
            "bookmarks" => Ok(Self::Bookmarks),
            "management" => Ok(Self::Management),
            other => Err(anyhow!("unknown tab: {}", other)),
        }
    }
}

/// Per-item insight lifecycle: idle -> pending -> ready | failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsightState {
    #[default]
    Idle,
    Pending,
    Ready(String),
    Failed(String),
}

impl InsightState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Text to show under the item, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Ready(text) | Self::Failed(text) => Some(text),
            Self::Idle | Self::Pending => None,
        }
    }
}

/// Everything the list view is derived from, apart from the catalog itself.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub tab: Tab,
    /// Visible item count per date group, absent means the first page
    pub visible: HashMap<String, usize>,
    pub insights: HashMap<String, InsightState>,
    /// News ids with a comment reply being generated
    pub composing: HashSet<String>,
    pub drafts: HashMap<String, String>,
    pub preferences: CategoryPreferences,

    // Mirrors of the live subscriptions, replaced wholesale on each snapshot.
    pub bookmarks: BTreeSet<String>,
    pub metrics: HashMap<String, InsightMetric>,
    pub comments: Vec<InsightComment>,

    /// Non-fatal notice, e.g. the catalog fallback
    pub banner: Option<String>,
    /// Last user-visible error
    pub error: Option<String>,
}

impl ViewState {
    /// Route a snapshot to the reducer of its stream.
    pub fn apply(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Bookmarks(docs) => self.reduce_bookmarks(docs),
            Snapshot::InsightMetrics(metrics) => self.reduce_metrics(metrics),
            Snapshot::InsightComments(comments) => self.reduce_comments(comments),
        }
    }

    fn reduce_bookmarks(&mut self, docs: Vec<Bookmark>) {
        self.bookmarks = docs.into_iter().map(|b| b.news_id).collect();
    }

    fn reduce_metrics(&mut self, metrics: Vec<InsightMetric>) {
        self.metrics = metrics.into_iter().map(|m| (m.news_id.clone(), m)).collect();
    }

    fn reduce_comments(&mut self, mut comments: Vec<InsightComment>) {
        // Stable: equal timestamps keep the store's insertion order.
        comments.sort_by_key(|c| c.created_at);
        self.comments = comments;
    }

    pub fn is_bookmarked(&self, news_id: &str) -> bool {
        self.bookmarks.contains(news_id)
    }

    pub fn insight(&self, news_id: &str) -> InsightState {
        self.insights.get(news_id).cloned().unwrap_or_default()
    }

    pub fn metric(&self, news_id: &str) -> InsightMetric {
        self.metrics
            .get(news_id)
            .cloned()
            .unwrap_or_else(|| InsightMetric::empty(news_id))
    }

    /// Comments of one item, oldest first.
    pub fn comments_for(&self, news_id: &str) -> Vec<InsightComment> {
        self.comments
            .iter()
            .filter(|c| c.news_id == news_id)
            .cloned()
            .collect()
    }
}

/// Single state container shared by the session, the subscription pump and the commands.
/// Every mutation bumps a revision observers can wait on.
pub struct ViewStore {
    state: RwLock<ViewState>,
    revision: watch::Sender<u64>,
}

impl ViewStore {
    pub fn new(state: ViewState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(state),
            revision,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> ViewState {
        self.read().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let result = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn apply(&self, snapshot: Snapshot) {
        self.update(|state| state.apply(snapshot));
        trace!(revision = *self.revision.borrow(), "snapshot applied");
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Wait until `condition` holds, re-checking after every update.
    pub async fn wait_for(&self, condition: impl Fn(&ViewState) -> bool, limit: Duration) -> Result<()> {
        let mut changes = self.subscribe();
        tokio::time::timeout(limit, async {
            loop {
                let satisfied = {
                    let state = self.read();
                    condition(&state)
                };
                if satisfied || changes.changed().await.is_err() {
                    return;
                }
            }
        })
        .await
        .context("timed out waiting for view state")
    }
}
