//! In-Memory Remote Store
//!
//! A process-local stand-in for the hosted realtime database, used by
//! tests and by embedders that want to run without a backend.
//!
//! Behaves like the hosted store where the model can observe it:
//! push keys sort chronologically, children iterate in key order,
//! every subscriber gets the full collection after each change,
//! updates on a missing key create a partial child and removing a
//! missing key succeeds.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::traits::{ChangeFeed, FeedSender, RemoteStore, StoreSnapshot};
use crate::domain::{CatalogError, CatalogResult};

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Subscribe,
    Push,
    Update,
    Remove,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    subscribers: HashMap<String, Vec<FeedSender>>,
    failures: HashMap<StoreOp, VecDeque<String>>,
    last_push_millis: i64,
    push_seq: u64,
    revision: u64,
}

impl StoreInner {
    fn take_failure(&mut self, op: StoreOp) -> CatalogResult<()> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(msg) => Err(CatalogError::StoreError(msg)),
            None => Ok(()),
        }
    }

    fn snapshot(&self, path: &str) -> StoreSnapshot {
        self.collections
            .get(path)
            .map(|children| {
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<StoreSnapshot>()
            })
            .unwrap_or_default()
            .with_revision(self.revision)
    }

    /// Send the current state of `path` to every live subscriber.
    ///
    /// Every write bumps the revision, so snapshots taken later always
    /// carry a higher number.
    fn broadcast(&mut self, path: &str) {
        self.revision += 1;
        let snapshot = self.snapshot(path);
        if let Some(subs) = self.subscribers.get_mut(path) {
            subs.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    /// Chronologically sortable key: zero-padded millis then a sequence number.
    fn next_push_key(&mut self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_push_millis = self.last_push_millis.max(now);
        self.push_seq += 1;
        format!("{:013}-{:08}", self.last_push_millis, self.push_seq)
    }
}

/// Thread-safe in-memory [`RemoteStore`]
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with a store error.
    ///
    /// Calls queue up; each failure is consumed once.
    pub async fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.failures.entry(op).or_default().push_back(message.into());
    }

    /// Write a raw child, bypassing record shape. Subscribers are notified.
    pub async fn put_raw(&self, path: &str, key: &str, value: Value) {
        let mut inner = self.inner.lock().await;
        inner
            .collections
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string(), value);
        inner.broadcast(path);
    }

    /// Current raw value of one child
    pub async fn record(&self, path: &str, key: &str) -> Option<Value> {
        let inner = self.inner.lock().await;
        inner.collections.get(path)?.get(key).cloned()
    }

    pub async fn len(&self, path: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.collections.get(path).map_or(0, BTreeMap::len)
    }

    /// Subscribers whose feed is still open
    pub async fn subscriber_count(&self, path: &str) -> usize {
        let mut inner = self.inner.lock().await;
        match inner.subscribers.get_mut(path) {
            Some(subs) => {
                subs.retain(|tx| !tx.is_closed());
                subs.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn subscribe(&self, path: &str) -> CatalogResult<ChangeFeed> {
        let mut inner = self.inner.lock().await;
        inner.take_failure(StoreOp::Subscribe)?;

        let (tx, feed) = ChangeFeed::channel();
        // Initial state; the receiver is alive so this cannot fail.
        let _ = tx.send(inner.snapshot(path));
        inner.subscribers.entry(path.to_string()).or_default().push(tx);
        log::debug!("in-memory store: new subscriber on {}", path);
        Ok(feed)
    }

    async fn push(&self, path: &str, record: Value) -> CatalogResult<String> {
        let mut inner = self.inner.lock().await;
        inner.take_failure(StoreOp::Push)?;

        let key = inner.next_push_key();
        inner
            .collections
            .entry(path.to_string())
            .or_default()
            .insert(key.clone(), record);
        inner.broadcast(path);
        Ok(key)
    }

    async fn update(&self, path: &str, key: &str, fields: Map<String, Value>) -> CatalogResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_failure(StoreOp::Update)?;

        let child = inner
            .collections
            .entry(path.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match child {
            Value::Object(existing) => existing.extend(fields),
            other => *other = Value::Object(fields),
        }
        inner.broadcast(path);
        Ok(())
    }

    async fn remove(&self, path: &str, key: &str) -> CatalogResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_failure(StoreOp::Remove)?;

        if let Some(children) = inner.collections.get_mut(path) {
            children.remove(key);
        }
        inner.broadcast(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_push_keys_sort_in_creation_order() {
        let store = InMemoryStore::new();
        let mut keys = Vec::new();
        for i in 0..20 {
            keys.push(store.push("items", json!({ "n": i })).await.unwrap());
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(store.len("items").await, 20);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_state_then_changes() {
        let store = InMemoryStore::new();
        let first = store.push("items", json!({ "n": 1 })).await.unwrap();

        let mut feed = store.subscribe("items").await.unwrap();
        let initial = feed.next().await.unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial.children()[0].key, first);

        store.push("items", json!({ "n": 2 })).await.unwrap();
        let next = feed.next().await.unwrap();
        assert_eq!(next.len(), 2);
    }

    #[tokio::test]
    async fn test_feed_coalesces_to_latest_snapshot() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe("items").await.unwrap();
        for i in 0..5 {
            store.push("items", json!({ "n": i })).await.unwrap();
        }
        let latest = feed.next().await.unwrap();
        assert_eq!(latest.len(), 5);
    }

    #[tokio::test]
    async fn test_snapshot_revisions_increase_across_feeds() {
        let store = InMemoryStore::new();
        let mut first = store.subscribe("items").await.unwrap();
        let initial = first.next().await.unwrap();

        store.push("items", json!({ "n": 1 })).await.unwrap();
        let mut second = store.subscribe("items").await.unwrap();
        let after_push = first.next().await.unwrap();
        let joined = second.next().await.unwrap();
        assert!(after_push.revision() > initial.revision());
        assert_eq!(joined.revision(), after_push.revision());

        store.remove("items", "nope").await.unwrap();
        assert!(second.next().await.unwrap().revision() > joined.revision());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryStore::new();
        let key = store
            .push("items", json!({ "name": "Ring", "isFavorite": false }))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("isFavorite".into(), json!(true));
        store.update("items", &key, fields).await.unwrap();

        let record = store.record("items", &key).await.unwrap();
        assert_eq!(record, json!({ "name": "Ring", "isFavorite": true }));
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = InMemoryStore::new();
        store.remove("items", "nope").await.unwrap();
        assert_eq!(store.len("items").await, 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_once() {
        let store = InMemoryStore::new();
        store.fail_next(StoreOp::Push, "offline").await;

        let err = store.push("items", json!({})).await.unwrap_err();
        assert_eq!(err, CatalogError::StoreError("offline".to_string()));
        assert!(store.push("items", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_feeds_are_pruned() {
        let store = InMemoryStore::new();
        let feed = store.subscribe("items").await.unwrap();
        let _other = store.subscribe("items").await.unwrap();
        assert_eq!(store.subscriber_count("items").await, 2);

        drop(feed);
        assert_eq!(store.subscriber_count("items").await, 1);
    }
}
