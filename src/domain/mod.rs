//! Domain Layer
//!
//! Contains the catalog entities, views and error types.
//! This layer knows nothing about the store or the runtime.

mod error;
mod item;
mod view;

pub use error::{CatalogError, CatalogResult, DecodeSkip};
pub use item::{fields, parse_price, CatalogItem, NewCatalogItem};
pub use view::{CatalogFilter, CatalogView};
