//! Synced Catalog
//!
//! Client-side catalog list model backed by a realtime document store.
//!
//! Layered architecture:
//! - domain: catalog items, views, errors
//! - repository: remote store abstraction and the in-memory store
//! - model: the synchronized item set and user intents
//! - images: per-slot image loading with stale-result guard
//! - config: JSON settings

pub mod config;
pub mod domain;
pub mod images;
pub mod model;
pub mod repository;

pub use config::CatalogConfig;
pub use domain::{
    CatalogError, CatalogFilter, CatalogItem, CatalogResult, CatalogView, DecodeSkip,
    NewCatalogItem,
};
pub use images::{HttpImageFetcher, ImageFetcher, ImageLoader, ImageSlots, LoadedImage, SlotTicket};
pub use model::{CatalogSubscription, SubscriptionHandle, SyncedCatalogModel};
pub use repository::{ChangeFeed, InMemoryStore, RemoteStore, StoreOp, StoreSnapshot};
