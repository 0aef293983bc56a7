/*
newsdesk - command line front of the reading session.
Starts one session, applies the requested view actions and prints the resulting list.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsdesk::auth::{AuthProvider, RemoteAuthProvider, SessionBootstrap};
use newsdesk::catalog::CatalogLoader;
use newsdesk::llm::remote::RemoteLlmProvider;
use newsdesk::llm::{DisabledProvider, LlmProvider, RetryPolicy};
use newsdesk::session::{NewsSession, SessionOptions, SessionParts};
use newsdesk::state::{InsightState, Tab};
use newsdesk::store::SqliteStore;
use newsdesk::view::{RenderedView, ViewSettings};

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Newsdesk reading session")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Tab to show (all, recommended, bookmarks, management)
    #[arg(long, default_value = "all")]
    tab: Tab,

    /// Generate the AI insight of this news id before printing
    #[arg(long, value_name = "NEWS_ID")]
    insight: Option<String>,

    /// Reveal one more page of this date group (repeatable)
    #[arg(long, value_name = "DATE")]
    show_more: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let store = SqliteStore::open(&config.database.path)
        .await
        .with_context(|| format!("failed to open document store at {}", config.database.path))?;

    let llm: Arc<dyn LlmProvider> = match config.llm.as_ref().map(create_llm_provider) {
        Some(Ok(provider)) => provider,
        Some(Err(e)) => {
            warn!(error = %e, "LLM provider unavailable, insights disabled");
            Arc::new(DisabledProvider)
        }
        None => Arc::new(DisabledProvider),
    };

    let parts = SessionParts {
        catalog: create_catalog_loader(&config),
        bootstrap: SessionBootstrap::new(create_auth_provider(&config)),
        store: Arc::new(store),
        llm,
    };
    let options = SessionOptions {
        view: view_settings(&config),
        retry: retry_policy(&config),
    };

    let mut session = NewsSession::start(parts, options).await;

    // Three initial snapshots, one per live query.
    let mut revisions = session.view_store().subscribe();
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while *revisions.borrow_and_update() < 3 {
            if revisions.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    if settled.is_err() {
        warn!("live subscriptions did not deliver in time, printing partial view");
    }

    session.select_tab(args.tab);
    for date in &args.show_more {
        session.show_more(date);
    }

    if let Some(news_id) = args.insight.as_deref() {
        match session.request_insight(news_id) {
            Some(task) => {
                if let Err(e) = task.await {
                    error!(%e, "insight task panicked");
                }
            }
            None => warn!(news_id, "unknown news id, no insight requested"),
        }
    }

    print_view(&session.render(), &session);
    session.stop();
    Ok(())
}

/// Create the provider answering insight and comment-reply prompts.
/// `[llm.insight]` takes precedence over `[llm.remote]`.
fn create_llm_provider(llm_config: &common::LlmConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("none");
    match adapter {
        "remote" => {
            let remote_config = llm_config
                .insight
                .as_ref()
                .or(llm_config.remote.as_ref())
                .ok_or_else(|| anyhow::anyhow!("Remote adapter selected but no [llm.remote] or [llm.insight] section"))?;

            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());

            let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
                remote_config.timeout_seconds.unwrap_or(30),
                remote_config.max_tokens.unwrap_or(400),
                0.7,
            );
            info!(model = provider.model(), "LLM provider initialized");
            Ok(Arc::new(provider))
        }
        "none" => Ok(Arc::new(DisabledProvider)),
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

fn create_auth_provider(config: &Config) -> Option<Arc<dyn AuthProvider>> {
    let api_url = config.auth.api_url.clone()?;
    let provider = RemoteAuthProvider::new(api_url)
        .with_api_key(read_env(config.auth.api_key_env.as_deref()))
        .with_custom_token(read_env(config.auth.custom_token_env.as_deref()))
        .with_timeout(config.auth.timeout_seconds.unwrap_or(10));
    Some(Arc::new(provider))
}

fn create_catalog_loader(config: &Config) -> CatalogLoader {
    CatalogLoader::new(config.catalog.sheet_url.clone())
        .with_api_key(read_env(config.catalog.api_key_env.as_deref()))
        .with_timeout(config.catalog.timeout_seconds.unwrap_or(10))
}

fn view_settings(config: &Config) -> ViewSettings {
    let defaults = ViewSettings::default();
    ViewSettings {
        page_size: config.view.page_size.filter(|n| *n > 0).unwrap_or(defaults.page_size),
        recommended_tag: config
            .view
            .recommended_tag
            .clone()
            .unwrap_or(defaults.recommended_tag),
    }
}

fn retry_policy(config: &Config) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: config.insight.max_attempts.unwrap_or(defaults.max_attempts).max(1),
        base_delay: config
            .insight
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
    }
}

fn read_env(name: Option<&str>) -> Option<String> {
    let name = name?;
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            warn!(env = name, "configured environment variable is not set");
            None
        }
    }
}

fn print_view(view: &RenderedView, session: &NewsSession) {
    if let Some(banner) = &view.banner {
        println!("! {}", banner);
    }
    if let Some(err) = &view.error {
        println!("! {}", err);
    }
    println!("[{}] signed in as {}", view.tab, session.identity().user_id);

    if view.tab == Tab::Management {
        let state = session.state();
        for (category, labels) in state.preferences.categories() {
            println!("\n{}:", category);
            for label in labels {
                println!(
                    "  [{}] {} ({}){}",
                    if label.enabled { "x" } else { " " },
                    label.label,
                    label.item_count,
                    if label.recommended { " *" } else { "" }
                );
            }
        }
        return;
    }

    if view.groups.is_empty() {
        println!("\nNothing to show.");
    }
    for group in &view.groups {
        println!("\n== {} ({}/{}) ==", group.date, group.visible(), group.total);
        for rendered in &group.items {
            let item = &rendered.item;
            println!(
                "{} {} | {} | {} | +{} -{}",
                if rendered.bookmarked { "*" } else { "-" },
                item.title,
                item.source,
                item.id,
                rendered.metric.upvotes,
                rendered.metric.downvotes
            );
            match &rendered.insight {
                InsightState::Pending => println!("    insight: generating..."),
                other => {
                    if let Some(text) = other.text() {
                        println!("    insight: {}", text);
                    }
                }
            }
            for comment in &rendered.comments {
                println!("    [{}] {}", comment.role, comment.text);
            }
        }
        if group.has_more() {
            println!("  ... --show-more {}", group.date);
        }
    }
}
