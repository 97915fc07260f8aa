//! Synced Catalog Model
//!
//! Owns the authoritative, ordered set of catalog items and keeps it in
//! step with the remote collection. Presentation layers read filtered
//! views and send intents (create, toggle favorite, delete) through here.
//!
//! All mutation of the set happens under one async mutex:
//! - a remote snapshot replaces the whole set, unless a newer one from
//!   another subscription was applied first
//! - `toggle_favorite` flips one item before the store is told
//! - `delete` drops the item only after the store acknowledged it
//!
//! `create` never touches the set; the new item shows up when the store
//! echoes it through the change feed.

mod subscription;

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::domain::{
    fields, CatalogError, CatalogFilter, CatalogItem, CatalogResult, CatalogView, NewCatalogItem,
};
use crate::repository::{RemoteStore, StoreSnapshot};

pub use subscription::{CatalogSubscription, SubscriptionHandle};

#[derive(Debug, Default)]
struct CatalogState {
    items: Vec<CatalogItem>,
    /// Revision of the last snapshot that replaced `items`
    last_applied: u64,
}

impl CatalogState {
    fn find_mut(&mut self, id: &str) -> Option<&mut CatalogItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

/// Cloneable handle to one catalog; clones share the same item set.
#[derive(Clone)]
pub struct SyncedCatalogModel {
    store: Arc<dyn RemoteStore>,
    config: Arc<CatalogConfig>,
    state: Arc<Mutex<CatalogState>>,
    local_tx: Arc<watch::Sender<u64>>,
}

impl SyncedCatalogModel {
    pub fn new(store: Arc<dyn RemoteStore>, config: CatalogConfig) -> Self {
        let (local_tx, _) = watch::channel(0);
        Self {
            store,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CatalogState::default())),
            local_tx: Arc::new(local_tx),
        }
    }

    /// Model over `store` with the default configuration
    pub fn with_store<S: RemoteStore + 'static>(store: S) -> Self {
        Self::new(Arc::new(store), CatalogConfig::default())
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn collection_path(&self) -> &str {
        &self.config.collection_path
    }

    pub(crate) fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    fn local_changes(&self) -> watch::Receiver<u64> {
        self.local_tx.subscribe()
    }

    fn notify_local_change(&self) {
        self.local_tx.send_modify(|rev| *rev += 1);
    }

    /// Start a lazy subscription for `filter`.
    ///
    /// Each call registers afresh with the store on first poll, so a
    /// dropped subscription is replaced by simply subscribing again.
    pub fn subscribe(&self, filter: CatalogFilter) -> CatalogSubscription {
        CatalogSubscription::new(self.clone(), filter)
    }

    /// Current set through `filter`
    pub async fn view(&self, filter: CatalogFilter) -> CatalogView {
        let state = self.state.lock().await;
        CatalogView::project(filter, &state.items)
    }

    /// Detail lookup by store key
    pub async fn item(&self, id: &str) -> Option<CatalogItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| item.id == id).cloned()
    }

    /// Replace the set with a decoded snapshot unless `token` was cancelled.
    ///
    /// A snapshot older than the one already applied leaves the set alone;
    /// the view then reflects the newer state.
    async fn apply_snapshot(
        &self,
        snapshot: &StoreSnapshot,
        filter: CatalogFilter,
        token: &CancellationToken,
    ) -> Option<CatalogView> {
        let items = decode_snapshot(snapshot);

        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            log::debug!("dropping snapshot delivered after unsubscribe");
            return None;
        }
        if snapshot.revision() < state.last_applied {
            log::debug!(
                "ignoring snapshot r{} older than applied r{}",
                snapshot.revision(),
                state.last_applied
            );
        } else {
            state.items = items;
            state.last_applied = snapshot.revision();
        }
        Some(CatalogView::project(filter, &state.items))
    }

    /// Validate and submit a new item. Returns the store-assigned key.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        price: f64,
        image_url: &str,
    ) -> CatalogResult<String> {
        let new_item = NewCatalogItem::new(name, description, price, image_url)?;
        self.create_item(&new_item).await
    }

    pub async fn create_item(&self, new_item: &NewCatalogItem) -> CatalogResult<String> {
        let record = new_item.to_record(Uuid::new_v4());
        let key = self
            .store
            .push(self.collection_path(), record)
            .await
            .map_err(|e| {
                log::warn!("create '{}' failed: {}", new_item.name, e);
                e
            })?;
        log::info!("created '{}' as {}", new_item.name, key);
        Ok(key)
    }

    /// Flip `is_favorite` locally, then push the single field to the store.
    ///
    /// A failed push is reported; the local flip is only undone when
    /// `rollback_failed_toggles` is configured.
    pub async fn toggle_favorite(&self, id: &str) -> CatalogResult<()> {
        let is_favorite = {
            let mut state = self.state.lock().await;
            let item = state
                .find_mut(id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
            item.toggle_favorite();
            item.is_favorite
        };
        self.notify_local_change();

        let mut update = Map::new();
        update.insert(fields::IS_FAVORITE.to_string(), Value::Bool(is_favorite));
        if let Err(e) = self.store.update(self.collection_path(), id, update).await {
            log::warn!("favorite update for {} failed: {}", id, e);
            if self.config.rollback_failed_toggles {
                self.rollback_toggle(id, is_favorite).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn rollback_toggle(&self, id: &str, flipped_to: bool) {
        let rolled_back = {
            let mut state = self.state.lock().await;
            match state.find_mut(id) {
                // A remote snapshot may already have settled the value.
                Some(item) if item.is_favorite == flipped_to => {
                    item.is_favorite = !flipped_to;
                    true
                }
                _ => false,
            }
        };
        if rolled_back {
            self.notify_local_change();
        }
    }

    /// Ask the store to delete `id`; drop it locally once acknowledged.
    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        self.store
            .remove(self.collection_path(), id)
            .await
            .map_err(|e| {
                log::warn!("delete {} failed: {}", id, e);
                e
            })?;

        let removed = {
            let mut state = self.state.lock().await;
            let before = state.items.len();
            state.items.retain(|item| item.id != id);
            state.items.len() != before
        };
        if removed {
            self.notify_local_change();
        }
        log::info!("deleted {}", id);
        Ok(())
    }
}

/// Decode every child, dropping records that fail validation.
fn decode_snapshot(snapshot: &StoreSnapshot) -> Vec<CatalogItem> {
    snapshot
        .children()
        .iter()
        .filter_map(|child| match CatalogItem::from_record(&child.key, &child.value) {
            Ok(item) => Some(item),
            Err(skip) => {
                log::debug!("skipping record {}: {}", child.key, skip);
                None
            }
        })
        .collect()
}
