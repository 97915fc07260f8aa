//! Item Image Loading
//!
//! Grid cells are reused as the list scrolls, so an image requested for
//! one item can finish after its slot already shows another. Every
//! request carries a [`SlotTicket`]; results whose ticket is no longer
//! current for its slot are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::CatalogConfig;
use crate::domain::{CatalogError, CatalogItem, CatalogResult};

/// Downloads image bytes for an item's `imageURL`
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CatalogResult<Vec<u8>>;
}

/// HTTP(S) fetcher backed by reqwest
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::ImageFetch(format!("cannot build client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CatalogConfig) -> CatalogResult<Self> {
        Self::new(config.image_fetch_timeout())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CatalogResult<Vec<u8>> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| CatalogError::ImageFetch(format!("bad URL {}: {}", url, e)))?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::ImageFetch(format!("{}: {}", url, e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::ImageFetch(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Identity of one image request: which slot, which item, which assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTicket {
    pub slot: usize,
    pub item_id: String,
    generation: u64,
}

/// Current assignment of every visible slot
#[derive(Debug, Default)]
pub struct ImageSlots {
    slots: HashMap<usize, (String, u64)>,
    next_generation: u64,
}

impl ImageSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `slot` at `item_id`, invalidating any earlier ticket for it.
    pub fn assign(&mut self, slot: usize, item_id: &str) -> SlotTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slots.insert(slot, (item_id.to_string(), generation));
        SlotTicket {
            slot,
            item_id: item_id.to_string(),
            generation,
        }
    }

    /// The slot went off screen or is being reused.
    pub fn release(&mut self, slot: usize) {
        self.slots.remove(&slot);
    }

    pub fn is_current(&self, ticket: &SlotTicket) -> bool {
        matches!(
            self.slots.get(&ticket.slot),
            Some((item_id, generation)) if *generation == ticket.generation && *item_id == ticket.item_id
        )
    }
}

/// A finished fetch, current or not
#[derive(Debug)]
pub struct LoadedImage {
    pub ticket: SlotTicket,
    pub result: CatalogResult<Vec<u8>>,
}

/// Runs fetches as independent tasks and hands back only current results
pub struct ImageLoader {
    fetcher: Arc<dyn ImageFetcher>,
    slots: ImageSlots,
    tx: mpsc::UnboundedSender<LoadedImage>,
    rx: mpsc::UnboundedReceiver<LoadedImage>,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            slots: ImageSlots::new(),
            tx,
            rx,
        }
    }

    /// Show `item` in `slot` and start fetching its image.
    pub fn load(&mut self, slot: usize, item: &CatalogItem) -> SlotTicket {
        let ticket = self.slots.assign(slot, &item.id);
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let url = item.image_url.clone();
        let task_ticket = ticket.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;
            // The loader may be gone; nothing to deliver to then.
            let _ = tx.send(LoadedImage {
                ticket: task_ticket,
                result,
            });
        });
        ticket
    }

    pub fn release(&mut self, slot: usize) {
        self.slots.release(slot);
    }

    pub fn accept(&self, loaded: &LoadedImage) -> bool {
        self.slots.is_current(&loaded.ticket)
    }

    /// Wait for the next result that still belongs to its slot.
    pub async fn next_ready(&mut self) -> Option<LoadedImage> {
        while let Some(loaded) = self.rx.recv().await {
            if self.accept(&loaded) {
                return Some(loaded);
            }
            log::debug!(
                "discarding stale image for {} in slot {}",
                loaded.ticket.item_id,
                loaded.ticket.slot
            );
        }
        None
    }
}
