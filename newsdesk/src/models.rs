use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single entry of the news catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub keyword: String,
    pub source: String,
    /// Raw tag string as published in the sheet, e.g. "recommended, ai"
    pub tags: String,
    pub url: String,
    /// Day-granularity date, usually "YYYY-MM-DD"
    pub date: String,
    pub summary: String,
    pub like_count: u32,
}

impl NewsItem {
    /// Build an item from a positional sheet row:
    /// (title, keyword, source, tags, url, date, summary, like-count, id).
    /// Returns `None` when the title or url cell is blank.
    pub fn from_row<S: AsRef<str>>(index: usize, row: &[S]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(|c| c.as_ref().trim()).unwrap_or("");

        let title = cell(0);
        let url = cell(4);
        if title.is_empty() || url.is_empty() {
            return None;
        }

        let id = match cell(8) {
            "" => format!("row-{}", index),
            id => id.to_string(),
        };

        Some(Self {
            id,
            title: title.to_string(),
            keyword: cell(1).to_string(),
            source: cell(2).to_string(),
            tags: cell(3).to_string(),
            url: url.to_string(),
            date: cell(5).to_string(),
            summary: cell(6).to_string(),
            like_count: cell(7).replace(',', "").parse().unwrap_or(0),
        })
    }

    /// Individual tags, split on commas, `#` and whitespace.
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags
            .split(|c: char| c == ',' || c == '#' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// One bookmark document, owned by a single identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: String,
    pub news_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Shared vote counters for the insight of one news item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightMetric {
    pub news_id: String,
    pub upvotes: u64,
    pub downvotes: u64,
}

impl InsightMetric {
    pub fn empty(news_id: impl Into<String>) -> Self {
        Self {
            news_id: news_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl FromStr for VoteDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "upvote" => Ok(Self::Up),
            "down" | "downvote" => Ok(Self::Down),
            other => Err(anyhow!("unknown vote direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentRole {
    User,
    Assistant,
}

impl CommentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for CommentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(anyhow!("unknown comment role: {}", other)),
        }
    }
}

/// Author id stamped on generated replies.
pub const ASSISTANT_AUTHOR_ID: &str = "insight-assistant";

/// An append-only comment in the thread under an insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightComment {
    pub id: String,
    pub news_id: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub role: CommentRole,
}

impl InsightComment {
    pub fn from_user(news_id: &str, text: &str, author_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            news_id: news_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
            author_id: author_id.to_string(),
            role: CommentRole::User,
        }
    }

    /// Assistant reply to `parent`; its timestamp is strictly later than the parent's
    /// even when the clock has not moved on.
    pub fn reply_to(parent: &InsightComment, text: &str) -> Self {
        let floor = parent.created_at + Duration::milliseconds(1);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            news_id: parent.news_id.clone(),
            text: text.to_string(),
            created_at: Utc::now().max(floor),
            author_id: ASSISTANT_AUTHOR_ID.to_string(),
            role: CommentRole::Assistant,
        }
    }
}
