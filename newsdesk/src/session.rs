use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{Identity, SessionBootstrap};
use crate::catalog::{CatalogLoader, LoadedCatalog};
use crate::commands::InteractionCommands;
use crate::live::LiveSubscriptionHub;
use crate::llm::insight::{describe_failure, insight_prompt};
use crate::llm::{InsightGenerator, LlmProvider, RetryPolicy};
use crate::models::VoteDirection;
use crate::state::{InsightState, Tab, ViewState, ViewStore};
use crate::store::DocumentStore;
use crate::view::{self, CategoryPreferences, RenderedView, ViewSettings};

/// Collaborators a session is started from.
pub struct SessionParts {
    pub catalog: CatalogLoader,
    pub bootstrap: SessionBootstrap,
    pub store: Arc<dyn DocumentStore>,
    pub llm: Arc<dyn LlmProvider>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub view: ViewSettings,
    pub retry: RetryPolicy,
}

/// One reading session: a loaded catalog, one identity, three live subscriptions
/// and the view state they feed.
pub struct NewsSession {
    identity: Identity,
    catalog: LoadedCatalog,
    settings: ViewSettings,
    view: Arc<ViewStore>,
    generator: Arc<InsightGenerator>,
    commands: InteractionCommands,
    hub: LiveSubscriptionHub,
    pump: Option<JoinHandle<()>>,
}

impl NewsSession {
    /// Load the catalog and resolve the identity, then open the live subscriptions.
    /// Both startup steps degrade instead of failing, so starting always succeeds.
    pub async fn start(parts: SessionParts, options: SessionOptions) -> Self {
        let SessionParts {
            catalog,
            bootstrap,
            store,
            llm,
        } = parts;

        let (catalog, identity) = tokio::join!(catalog.load(), bootstrap.resolve_identity());

        let state = ViewState {
            banner: catalog.banner(),
            preferences: CategoryPreferences::from_catalog(&catalog.items, &options.view.recommended_tag),
            ..ViewState::default()
        };
        let view = Arc::new(ViewStore::new(state));

        let (sink, mut snapshots) = mpsc::unbounded_channel();
        let hub = LiveSubscriptionHub::open(store.clone(), &identity.user_id, sink);

        let pump = {
            let view = view.clone();
            tokio::spawn(async move {
                while let Some(snapshot) = snapshots.recv().await {
                    view.apply(snapshot);
                }
                debug!("snapshot pump stopped");
            })
        };

        let generator = Arc::new(InsightGenerator::new(llm, options.retry));
        let commands = InteractionCommands::new(store, view.clone(), generator.clone(), identity.clone());

        info!(
            user_id = %identity.user_id,
            items = catalog.items.len(),
            fallback = catalog.is_fallback(),
            "session started"
        );

        Self {
            identity,
            catalog,
            settings: options.view,
            view,
            generator,
            commands,
            hub,
            pump: Some(pump),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn catalog(&self) -> &LoadedCatalog {
        &self.catalog
    }

    pub fn view_store(&self) -> &Arc<ViewStore> {
        &self.view
    }

    /// Clone of the current view state.
    pub fn state(&self) -> ViewState {
        self.view.snapshot()
    }

    /// Derive the list for the active tab.
    pub fn render(&self) -> RenderedView {
        view::derive(&self.catalog.items, &self.view.read(), &self.settings)
    }

    pub fn select_tab(&self, tab: Tab) {
        self.view.update(|state| state.tab = tab);
    }

    /// Reveal another page of the given date group.
    pub fn show_more(&self, date: &str) {
        self.view
            .update(|state| view::show_more(&self.catalog.items, state, &self.settings, date));
    }

    pub fn toggle_preference(&self, category: &str, label: &str) -> Option<bool> {
        self.view.update(|state| state.preferences.toggle(category, label))
    }

    pub fn set_draft(&self, news_id: &str, text: &str) {
        self.view
            .update(|state| state.drafts.insert(news_id.to_string(), text.to_string()));
    }

    pub fn dismiss_error(&self) {
        self.view.update(|state| state.error = None);
    }

    pub async fn toggle_bookmark(&self, news_id: &str) {
        self.commands.toggle_bookmark(news_id).await;
    }

    pub async fn cast_vote(&self, news_id: &str, direction: VoteDirection) {
        self.commands.cast_vote(news_id, direction).await;
    }

    /// Post `text` under the insight of `news_id`. See [`InteractionCommands::post_comment`].
    pub async fn post_comment(&self, news_id: &str, text: &str) -> Option<JoinHandle<()>> {
        let Some(item) = self.catalog.get(news_id) else {
            warn!(news_id, "comment on unknown item ignored");
            return None;
        };
        self.commands.post_comment(news_id, text, &item.title).await
    }

    /// Post the current draft of `news_id`.
    pub async fn submit_draft(&self, news_id: &str) -> Option<JoinHandle<()>> {
        let draft = self.view.read().drafts.get(news_id).cloned()?;
        self.post_comment(news_id, &draft).await
    }

    /// Start generating the insight of `news_id` in the background.
    ///
    /// Rejected (returns `None`) while a generation for the same item is pending, or when the
    /// item is unknown. The result lands in the view state only.
    pub fn request_insight(&self, news_id: &str) -> Option<JoinHandle<()>> {
        let item = self.catalog.get(news_id)?.clone();

        let started = self.view.update(|state| {
            let entry = state.insights.entry(news_id.to_string()).or_default();
            if entry.is_pending() {
                return false;
            }
            *entry = InsightState::Pending;
            true
        });
        if !started {
            debug!(news_id, "insight already pending, request ignored");
            return None;
        }

        let generator = self.generator.clone();
        let view = self.view.clone();
        Some(tokio::spawn(async move {
            let outcome = match generator.complete(insight_prompt(&item)).await {
                Ok(text) => InsightState::Ready(text),
                Err(e) => InsightState::Failed(describe_failure(&e)),
            };
            view.update(|state| {
                state.insights.insert(item.id.clone(), outcome);
            });
        }))
    }

    /// Close the subscriptions and abort pending generations. Idempotent.
    pub fn stop(&mut self) {
        self.generator.cancellation().cancel();
        self.hub.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
            info!(user_id = %self.identity.user_id, "session stopped");
        }
    }
}

impl Drop for NewsSession {
    fn drop(&mut self) {
        self.stop();
    }
}
