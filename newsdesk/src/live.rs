use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::{DocumentStore, LiveQuery, Snapshot};

/// The three live queries a session keeps open, scoped to one identity.
pub struct LiveSubscriptionHub {
    user_id: String,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSubscriptionHub {
    /// Open bookmark, metric and comment subscriptions. Every snapshot is forwarded to `sink`;
    /// snapshots of one query arrive in order, different queries interleave freely.
    pub fn open(store: Arc<dyn DocumentStore>, user_id: &str, sink: mpsc::UnboundedSender<Snapshot>) -> Self {
        let queries = [
            LiveQuery::Bookmarks {
                user_id: user_id.to_string(),
            },
            LiveQuery::InsightMetrics,
            LiveQuery::InsightComments,
        ];

        let tasks = queries
            .into_iter()
            .map(|query| tokio::spawn(run_live_query(store.clone(), query, sink.clone())))
            .collect();

        info!(user_id, "live subscriptions opened");
        Self {
            user_id: user_id.to_string(),
            tasks,
        }
    }

    pub fn is_open(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Tear down all three subscriptions.
    pub fn close(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!(user_id = %self.user_id, "live subscriptions closed");
    }
}

impl Drop for LiveSubscriptionHub {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_live_query(store: Arc<dyn DocumentStore>, query: LiveQuery, sink: mpsc::UnboundedSender<Snapshot>) {
    // Subscribe before the first read so no write slips between the two.
    let mut changes = store.changes();
    if !deliver(store.as_ref(), &query, &sink).await {
        return;
    }

    let collection = query.collection();
    loop {
        match changes.recv().await {
            Ok(changed) if changed == collection => {
                if !deliver(store.as_ref(), &query, &sink).await {
                    break;
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(?collection, missed, "change feed lagged, re-reading");
                if !deliver(store.as_ref(), &query, &sink).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(?collection, "live query finished");
}

/// Read and forward one snapshot. Returns false once nobody listens anymore.
async fn deliver(store: &dyn DocumentStore, query: &LiveQuery, sink: &mpsc::UnboundedSender<Snapshot>) -> bool {
    match store.snapshot(query).await {
        Ok(snapshot) => sink.send(snapshot).is_ok(),
        Err(e) => {
            // Keep the previous snapshot in place; the next change retries the read.
            error!(?query, error = %e, "live query read failed");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteDirection;
    use crate::store::SqliteStore;
    use std::time::Duration;

    async fn next(rx: &mut mpsc::UnboundedReceiver<Snapshot>) -> Snapshot {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("snapshot in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn initial_snapshots_then_changes() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store.add_bookmark("u1", "n1").await.unwrap();
        store.add_bookmark("u2", "n2").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut hub = LiveSubscriptionHub::open(store.clone(), "u1", tx);

        let mut seen_bookmarks = None;
        for _ in 0..3 {
            if let Snapshot::Bookmarks(docs) = next(&mut rx).await {
                seen_bookmarks = Some(docs);
            }
        }
        let docs = seen_bookmarks.expect("initial bookmark snapshot");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].news_id, "n1");

        store.increment_metric("n1", VoteDirection::Up).await.unwrap();
        match next(&mut rx).await {
            Snapshot::InsightMetrics(metrics) => assert_eq!(metrics[0].upvotes, 1),
            other => panic!("unexpected snapshot: {:?}", other),
        }

        hub.close();
        assert!(!hub.is_open());
    }
}
