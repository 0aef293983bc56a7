use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::NewsItem;

/// Where the loaded catalog came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Remote,
    /// Embedded dataset served because the sheet could not be used
    Fallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub items: Vec<NewsItem>,
    pub source: CatalogSource,
}

impl LoadedCatalog {
    /// Non-fatal notice to show when the catalog is not live.
    pub fn banner(&self) -> Option<String> {
        match &self.source {
            CatalogSource::Remote => None,
            CatalogSource::Fallback { .. } => {
                Some("Live news could not be loaded. Showing saved headlines.".to_string())
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, CatalogSource::Fallback { .. })
    }

    pub fn get(&self, news_id: &str) -> Option<&NewsItem> {
        self.items.iter().find(|item| item.id == news_id)
    }
}

/// Loads the news catalog from a spreadsheet values endpoint.
pub struct CatalogLoader {
    sheet_url: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl CatalogLoader {
    pub fn new(sheet_url: Option<String>) -> Self {
        Self {
            sheet_url,
            api_key: None,
            timeout: Duration::from_secs(10),
            client: Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    /// Fetch the catalog. Any failure yields the embedded dataset instead; there is no retry.
    pub async fn load(&self) -> LoadedCatalog {
        match self.fetch_remote().await {
            Ok(items) => {
                info!(count = items.len(), "catalog loaded from sheet");
                LoadedCatalog {
                    items,
                    source: CatalogSource::Remote,
                }
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "catalog fetch failed, serving embedded dataset");
                LoadedCatalog {
                    items: fallback_catalog(),
                    source: CatalogSource::Fallback {
                        reason: format!("{:#}", e),
                    },
                }
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<NewsItem>> {
        let url = self
            .sheet_url
            .as_deref()
            .context("no catalog sheet configured")?;

        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await.context("catalog request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("catalog fetch failed with status: {}", status);
        }

        let sheet: SheetValues = response
            .json()
            .await
            .context("failed to parse catalog sheet")?;

        let items = parse_rows(&sheet.values);
        if items.is_empty() {
            anyhow::bail!("catalog sheet has no usable rows ({} raw)", sheet.values.len());
        }
        Ok(items)
    }
}

/// Values payload of a sheet range.
#[derive(Debug, Deserialize)]
struct SheetValues {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Map raw sheet rows to items, skipping a leading header row and rows without title or url.
pub fn parse_rows(rows: &[Vec<serde_json::Value>]) -> Vec<NewsItem> {
    rows.iter()
        .enumerate()
        .filter(|(index, row)| !(*index == 0 && is_header(row)))
        .filter_map(|(index, row)| {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            NewsItem::from_row(index, &cells)
        })
        .collect()
}

fn is_header(row: &[serde_json::Value]) -> bool {
    row.first()
        .and_then(|c| c.as_str())
        .map(|c| c.trim().eq_ignore_ascii_case("title"))
        .unwrap_or(false)
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// (title, keyword, source, tags, url, date, summary, like-count, id)
const FALLBACK_ROWS: &[[&str; 9]] = &[
    [
        "Open-weight language models close the gap with proprietary systems",
        "AI",
        "Tech Ledger",
        "recommended, ai",
        "https://news.example.com/ai/open-weight-models",
        "2024-06-03",
        "Benchmarks show community models within a few points of the leading commercial ones.",
        "128",
        "fallback-1",
    ],
    [
        "Chipmakers expand capacity amid steady demand for accelerators",
        "Semiconductors",
        "Market Wire",
        "industry",
        "https://news.example.com/chips/capacity",
        "2024-06-03",
        "New fabs announced across three continents.",
        "64",
        "fallback-2",
    ],
    [
        "Central banks signal patience on rate cuts",
        "Economy",
        "Market Wire",
        "recommended, macro",
        "https://news.example.com/economy/rates",
        "2024-06-02",
        "Policy makers want more evidence that inflation is easing.",
        "97",
        "fallback-3",
    ],
    [
        "Battery recycling startups attract record funding",
        "Energy",
        "Green Daily",
        "climate",
        "https://news.example.com/energy/battery-recycling",
        "2024-06-02",
        "Investors bet on recovered lithium and nickel.",
        "41",
        "fallback-4",
    ],
    [
        "Browser vendors agree on a common extension API",
        "Web",
        "Tech Ledger",
        "standards",
        "https://news.example.com/web/extensions",
        "2024-06-01",
        "The shared API aims to reduce porting work for developers.",
        "33",
        "fallback-5",
    ],
];

/// Embedded dataset served whenever the live catalog is unavailable. Never empty.
pub fn fallback_catalog() -> Vec<NewsItem> {
    FALLBACK_ROWS
        .iter()
        .enumerate()
        .filter_map(|(index, row)| NewsItem::from_row(index, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_is_complete() {
        let items = fallback_catalog();
        assert_eq!(items.len(), FALLBACK_ROWS.len());
        assert!(items.iter().any(|i| i.has_tag("recommended")));
    }

    #[test]
    fn header_and_incomplete_rows_are_skipped() {
        let rows = vec![
            vec![json!("title"), json!("keyword"), json!("source")],
            vec![
                json!("Valid"),
                json!("k"),
                json!("s"),
                json!("t"),
                json!("https://x"),
                json!("2024-06-01"),
                json!("sum"),
                json!(12),
                json!("id-1"),
            ],
            vec![json!(""), json!("k"), json!("s"), json!("t"), json!("https://y")],
            vec![json!("No url")],
        ];

        let items = parse_rows(&rows);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "id-1");
        assert_eq!(items[0].like_count, 12);
    }

    #[tokio::test]
    async fn unconfigured_loader_serves_fallback() {
        let catalog = CatalogLoader::new(None).load().await;
        assert!(catalog.is_fallback());
        assert!(!catalog.items.is_empty());
        assert!(catalog.banner().is_some());
    }
}
