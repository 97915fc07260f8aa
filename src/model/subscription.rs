//! Catalog Subscriptions
//!
//! A lazy, restartable sequence of [`CatalogView`]s for one filter.

use futures::Stream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::SyncedCatalogModel;
use crate::domain::{CatalogFilter, CatalogResult, CatalogView};
use crate::repository::{ChangeFeed, StoreSnapshot};

/// Cancels a subscription from outside the task that polls it
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum Wake {
    Cancelled,
    Remote(Option<StoreSnapshot>),
    Local,
}

/// Views of the catalog, produced as the remote collection changes.
///
/// Nothing is registered with the store until the first call to
/// [`next`](Self::next). Each remote snapshot replaces the model's
/// authoritative set before the filtered view is emitted; local
/// optimistic changes made through the model also produce a view.
pub struct CatalogSubscription {
    model: SyncedCatalogModel,
    filter: CatalogFilter,
    feed: Option<ChangeFeed>,
    local: watch::Receiver<u64>,
    token: CancellationToken,
}

impl CatalogSubscription {
    pub(super) fn new(model: SyncedCatalogModel, filter: CatalogFilter) -> Self {
        let local = model.local_changes();
        Self {
            model,
            filter,
            feed: None,
            local,
            token: CancellationToken::new(),
        }
    }

    pub fn filter(&self) -> CatalogFilter {
        self.filter
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            token: self.token.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.feed.is_some() && !self.token.is_cancelled()
    }

    /// Next view, or `None` once cancelled or the store closed the feed.
    ///
    /// A registration failure is returned as an error and leaves the
    /// subscription unregistered, so the following call retries.
    pub async fn next(&mut self) -> Option<CatalogResult<CatalogView>> {
        if self.token.is_cancelled() {
            return None;
        }

        if self.feed.is_none() {
            let path = self.model.collection_path().to_string();
            let registered = tokio::select! {
                biased;
                _ = self.token.cancelled() => return None,
                registered = self.model.store().subscribe(&path) => registered,
            };
            match registered {
                Ok(feed) => {
                    log::debug!("subscribed to {} ({:?})", path, self.filter);
                    self.feed = Some(feed);
                }
                Err(e) => {
                    log::warn!("subscribe to {} failed: {}", path, e);
                    return Some(Err(e));
                }
            }
        }

        let feed = self.feed.as_mut()?;
        let wake = tokio::select! {
            biased;
            _ = self.token.cancelled() => Wake::Cancelled,
            snapshot = feed.next() => Wake::Remote(snapshot),
            changed = self.local.changed() => match changed {
                Ok(()) => Wake::Local,
                Err(_) => Wake::Cancelled,
            },
        };

        match wake {
            Wake::Cancelled => None,
            Wake::Remote(Some(snapshot)) => self
                .model
                .apply_snapshot(&snapshot, self.filter, &self.token)
                .await
                .map(Ok),
            Wake::Remote(None) => {
                log::info!("change feed for {:?} view closed by store", self.filter);
                self.feed = None;
                None
            }
            Wake::Local => Some(Ok(self.model.view(self.filter).await)),
        }
    }

    /// Stop receiving views. No later delivery touches the model.
    pub fn unsubscribe(self) {
        self.token.cancel();
        log::debug!("unsubscribed ({:?})", self.filter);
    }

    /// Adapt into a [`Stream`] of views.
    pub fn into_stream(self) -> impl Stream<Item = CatalogResult<CatalogView>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let view = sub.next().await?;
            Some((view, sub))
        })
    }
}

impl Drop for CatalogSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
