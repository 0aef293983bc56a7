use chrono::{Duration, Utc};
use newsdesk::models::{CommentRole, InsightComment, VoteDirection};
use newsdesk::store::{Collection, DocumentStore, LiveQuery, Snapshot, SqliteStore};
use std::sync::Arc;

async fn bookmarks(store: &SqliteStore, user_id: &str) -> Vec<String> {
    match store
        .snapshot(&LiveQuery::Bookmarks {
            user_id: user_id.to_string(),
        })
        .await
        .expect("bookmark snapshot")
    {
        Snapshot::Bookmarks(docs) => docs.into_iter().map(|b| b.news_id).collect(),
        other => panic!("unexpected snapshot: {:?}", other),
    }
}

#[tokio::test]
async fn bookmarks_are_scoped_to_their_owner() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.add_bookmark("alice", "n1").await.unwrap();
    store.add_bookmark("bob", "n2").await.unwrap();

    assert_eq!(bookmarks(&store, "alice").await, vec!["n1"]);
    assert_eq!(bookmarks(&store, "bob").await, vec!["n2"]);
    assert!(bookmarks(&store, "carol").await.is_empty());
}

#[tokio::test]
async fn remove_deletes_every_duplicate() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.add_bookmark("alice", "n1").await.unwrap();
    store.add_bookmark("alice", "n1").await.unwrap();
    store.add_bookmark("alice", "n2").await.unwrap();
    store.add_bookmark("bob", "n1").await.unwrap();

    let removed = store.remove_bookmarks("alice", "n1").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(bookmarks(&store, "alice").await, vec!["n2"]);
    assert_eq!(bookmarks(&store, "bob").await, vec!["n1"]);

    assert_eq!(store.remove_bookmarks("alice", "n1").await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_votes_are_all_counted() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());

    let mut tasks = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let direction = if i % 4 == 0 { VoteDirection::Down } else { VoteDirection::Up };
        tasks.push(tokio::spawn(async move {
            store.increment_metric("n1", direction).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    match store.snapshot(&LiveQuery::InsightMetrics).await.unwrap() {
        Snapshot::InsightMetrics(metrics) => {
            assert_eq!(metrics.len(), 1);
            assert_eq!(metrics[0].news_id, "n1");
            assert_eq!(metrics[0].upvotes, 15);
            assert_eq!(metrics[0].downvotes, 5);
        }
        other => panic!("unexpected snapshot: {:?}", other),
    }
}

#[tokio::test]
async fn first_vote_creates_metric_from_zero() {
    let store = SqliteStore::in_memory().await.unwrap();
    let metric = store.increment_metric("fresh", VoteDirection::Down).await.unwrap();
    assert_eq!((metric.upvotes, metric.downvotes), (0, 1));
}

#[tokio::test]
async fn comments_come_back_in_timestamp_order() {
    let store = SqliteStore::in_memory().await.unwrap();

    let mut question = InsightComment::from_user("n1", "why now?", "alice");
    let base = Utc::now();
    question.created_at = base;
    let reply = InsightComment::reply_to(&question, "because supply is short");
    let mut earlier = InsightComment::from_user("n1", "first!", "bob");
    earlier.created_at = base - Duration::seconds(30);

    store.append_comment(&reply).await.unwrap();
    store.append_comment(&question).await.unwrap();
    store.append_comment(&earlier).await.unwrap();

    match store.snapshot(&LiveQuery::InsightComments).await.unwrap() {
        Snapshot::InsightComments(comments) => {
            let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(texts, vec!["first!", "why now?", "because supply is short"]);
            assert_eq!(comments[2].role, CommentRole::Assistant);
        }
        other => panic!("unexpected snapshot: {:?}", other),
    }
}

#[tokio::test]
async fn writes_are_announced_on_the_change_feed() {
    let store = SqliteStore::in_memory().await.unwrap();
    let mut changes = store.changes();

    store.add_bookmark("alice", "n1").await.unwrap();
    store.increment_metric("n1", VoteDirection::Up).await.unwrap();
    store
        .append_comment(&InsightComment::from_user("n1", "hi", "alice"))
        .await
        .unwrap();

    assert_eq!(changes.recv().await.unwrap(), Collection::Bookmarks);
    assert_eq!(changes.recv().await.unwrap(), Collection::InsightMetrics);
    assert_eq!(changes.recv().await.unwrap(), Collection::InsightComments);
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("newsdesk.db");
    let path = path.to_str().unwrap();

    {
        let store = SqliteStore::open(path).await.unwrap();
        store.add_bookmark("alice", "n1").await.unwrap();
        store.increment_metric("n1", VoteDirection::Up).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteStore::open(path).await.unwrap();
    assert_eq!(bookmarks(&store, "alice").await, vec!["n1"]);
    let metric = store.increment_metric("n1", VoteDirection::Up).await.unwrap();
    assert_eq!(metric.upvotes, 2);
}
