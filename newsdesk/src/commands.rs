use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::Identity;
use crate::llm::insight::{reply_prompt, InsightGenerator};
use crate::models::{InsightComment, VoteDirection};
use crate::state::ViewStore;
use crate::store::DocumentStore;

/// How long a bookmark toggle waits for its write to come back through the live subscription.
const MIRROR_WAIT: Duration = Duration::from_secs(5);

/// User-triggered writes. Results are observed back through the live subscriptions;
/// nothing here patches the mirrored collections in the view state.
pub struct InteractionCommands {
    store: Arc<dyn DocumentStore>,
    view: Arc<ViewStore>,
    generator: Arc<InsightGenerator>,
    identity: Identity,
    /// Serializes bookmark toggles so each one decides from a mirror that includes the previous write
    toggles: Mutex<()>,
}

impl InteractionCommands {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        view: Arc<ViewStore>,
        generator: Arc<InsightGenerator>,
        identity: Identity,
    ) -> Self {
        Self {
            store,
            view,
            generator,
            identity,
            toggles: Mutex::new(()),
        }
    }

    /// Delete this identity's bookmarks for `news_id` if the mirror shows it bookmarked,
    /// otherwise create one.
    ///
    /// Toggles run one at a time, and each returns only once the live bookmark snapshot
    /// reflects its write, so back-to-back toggles alternate correctly.
    pub async fn toggle_bookmark(&self, news_id: &str) {
        let _turn = self.toggles.lock().await;

        let bookmarked = self.view.read().is_bookmarked(news_id);
        let user_id = self.identity.user_id.as_str();

        let result = if bookmarked {
            self.store
                .remove_bookmarks(user_id, news_id)
                .await
                .map(|removed| debug!(news_id, removed, "bookmark removed"))
        } else {
            self.store
                .add_bookmark(user_id, news_id)
                .await
                .map(|bookmark| debug!(news_id, id = bookmark.id, "bookmark added"))
        };

        if let Err(e) = result {
            error!(news_id, error = %e, "bookmark toggle failed");
            return;
        }

        let settled = self
            .view
            .wait_for(|state| state.is_bookmarked(news_id) != bookmarked, MIRROR_WAIT)
            .await;
        if settled.is_err() {
            warn!(news_id, "bookmark snapshot did not arrive in time");
        }
    }

    pub async fn cast_vote(&self, news_id: &str, direction: VoteDirection) {
        match self.store.increment_metric(news_id, direction).await {
            Ok(metric) => debug!(
                news_id,
                ?direction,
                upvotes = metric.upvotes,
                downvotes = metric.downvotes,
                "vote recorded"
            ),
            Err(e) => error!(news_id, ?direction, error = %e, "vote failed"),
        }
    }

    /// Append the user's comment, then generate and append an assistant reply in the background.
    ///
    /// Returns the reply task, or `None` when the text is blank or the user comment could not
    /// be stored (no reply is generated for a comment that does not exist).
    pub async fn post_comment(&self, news_id: &str, text: &str, item_title: &str) -> Option<JoinHandle<()>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let comment = InsightComment::from_user(news_id, text, &self.identity.user_id);
        if let Err(e) = self.store.append_comment(&comment).await {
            error!(news_id, error = %e, "failed to store comment");
            return None;
        }

        self.view.update(|state| {
            state.drafts.remove(news_id);
            state.composing.insert(news_id.to_string());
        });

        let store = self.store.clone();
        let view = self.view.clone();
        let generator = self.generator.clone();
        let prompt = reply_prompt(item_title, text);

        Some(tokio::spawn(async move {
            let reply = generator.complete(prompt).await;

            match &reply {
                Ok(reply) => {
                    let answer = InsightComment::reply_to(&comment, reply);
                    match store.append_comment(&answer).await {
                        Ok(()) => info!(news_id = %comment.news_id, "assistant reply posted"),
                        Err(e) => error!(news_id = %comment.news_id, error = %e, "failed to store assistant reply"),
                    }
                }
                Err(e) => error!(news_id = %comment.news_id, error = %e, "assistant reply failed"),
            }

            view.update(|state| {
                state.composing.remove(&comment.news_id);
                if let Err(e) = &reply {
                    state.error = Some(format!("AI reply failed: {}", e));
                }
            });
        }))
    }
}
