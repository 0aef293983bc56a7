/*!
common/src/lib.rs

Shared configuration types and DB helper functions for newsdesk.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default and an override config file
- A helper to initialize an SQLite connection pool for the document store
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsdesk.db")
    pub path: String,
}

/// Spreadsheet-backed news catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Values endpoint of the sheet range, e.g.
    /// "https://sheets.googleapis.com/v4/spreadsheets/<id>/values/News!A:I"
    pub sheet_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Identity service used to bootstrap the session identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the identity toolkit, e.g. "https://identitytoolkit.googleapis.com/v1"
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    /// When set and the variable is present, sign in with this custom token instead of anonymously
    pub custom_token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    // Fallback: single remote config
    pub remote: Option<RemoteLlmConfig>,
    // Task-specific override for insights and comment replies
    pub insight: Option<RemoteLlmConfig>,
}

/// Retry tuning for the insight generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

/// List view tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    pub page_size: Option<usize>,
    /// Tag marking an item as recommended
    pub recommended_tag: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub insight: InsightConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary and return a configured
/// `SqlitePool` in WAL mode. Defaults are conservative:
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/newsdesk.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_from_string_and_db_pool() {
        let toml = r#"
            [database]
            path = "data/test.db"

            [catalog]
            sheet_url = "https://sheets.example.com/values/News!A:I"
            timeout_seconds = 5

            [view]
            page_size = 3
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.catalog.timeout_seconds, Some(5));
        assert_eq!(cfg.view.page_size, Some(3));
        assert!(cfg.auth.api_url.is_none());
        assert!(cfg.llm.is_none());

        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("newsdesk.db");
        let pool = init_db_pool(&db_path.to_string_lossy()).await.expect("init pool");
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(
            &default_path,
            "[database]\npath = \"data/default.db\"\n\n[view]\npage_size = 3\nrecommended_tag = \"recommended\"\n",
        )
        .await
        .unwrap();
        tokio::fs::write(&override_path, "[view]\npage_size = 5\n").await.unwrap();

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load merged config");

        assert_eq!(cfg.database.path, "data/default.db");
        assert_eq!(cfg.view.page_size, Some(5));
        assert_eq!(cfg.view.recommended_tag.as_deref(), Some("recommended"));
    }

    #[tokio::test]
    async fn missing_override_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        tokio::fs::write(&default_path, "[database]\npath = \"a.db\"\n").await.unwrap();

        let missing = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(&default_path), Some(&missing))
            .await
            .expect("load");
        assert_eq!(cfg.database.path, "a.db");
    }
}
