//! Repository Layer - Core Traits
//!
//! Defines the abstract interface to the remote realtime store.
//! The hosted backend is an external collaborator; the model only
//! consumes the four operations below.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::domain::CatalogResult;

/// One child of a collection snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSnapshot {
    pub key: String,
    pub value: Value,
}

/// Full, ordered state of a collection at one point in time.
///
/// `revision` is assigned by the store and never decreases across the
/// snapshots of one collection, whichever feed delivers them. Backends
/// that cannot number their snapshots leave it at 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreSnapshot {
    revision: u64,
    children: Vec<ChildSnapshot>,
}

impl StoreSnapshot {
    /// Children must already be in the store's native iteration order.
    pub fn new(children: Vec<ChildSnapshot>) -> Self {
        Self {
            revision: 0,
            children,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn children(&self) -> &[ChildSnapshot] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl FromIterator<(String, Value)> for StoreSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, value)| ChildSnapshot { key, value })
                .collect(),
        )
    }
}

/// Sending half of a change feed, held by the store backend
pub type FeedSender = mpsc::UnboundedSender<StoreSnapshot>;

/// Receiving half of a change feed.
///
/// The feed ends when the backend drops its sender.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<StoreSnapshot>,
}

impl ChangeFeed {
    pub fn channel() -> (FeedSender, ChangeFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ChangeFeed { rx })
    }

    /// Wait for the next snapshot.
    ///
    /// Snapshots are full collection states, so when several are queued
    /// only the newest is returned.
    pub async fn next(&mut self) -> Option<StoreSnapshot> {
        let mut latest = self.rx.recv().await?;
        while let Ok(newer) = self.rx.try_recv() {
            latest = newer;
        }
        Some(latest)
    }
}

/// The remote keyed document collection
///
/// All operations are async; implementations wrap a hosted realtime
/// database SDK or, for tests, [`super::InMemoryStore`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Subscribe to every change under `path`.
    ///
    /// The current state is delivered first, then one snapshot per change.
    async fn subscribe(&self, path: &str) -> CatalogResult<ChangeFeed>;

    /// Create a child under a store-generated key and return the key
    async fn push(&self, path: &str, record: Value) -> CatalogResult<String>;

    /// Overwrite the named fields of one child, leaving the rest intact
    async fn update(&self, path: &str, key: &str, fields: Map<String, Value>) -> CatalogResult<()>;

    /// Delete one child
    async fn remove(&self, path: &str, key: &str) -> CatalogResult<()>;
}
