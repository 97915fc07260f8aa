//! Catalog Views
//!
//! Read-only, filtered projections of the authoritative item set.

use serde::{Deserialize, Serialize};

use super::item::CatalogItem;

/// Which items a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogFilter {
    #[default]
    All,
    FavoritesOnly,
}

impl CatalogFilter {
    pub fn matches(&self, item: &CatalogItem) -> bool {
        match self {
            CatalogFilter::All => true,
            CatalogFilter::FavoritesOnly => item.is_favorite,
        }
    }

    /// Screen title for this filter
    pub fn title(&self) -> &'static str {
        match self {
            CatalogFilter::All => "Catalog",
            CatalogFilter::FavoritesOnly => "Favorites",
        }
    }
}

/// An ordered snapshot of items passing a filter
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CatalogView {
    filter: CatalogFilter,
    items: Vec<CatalogItem>,
}

impl CatalogView {
    /// Project `items` through `filter`, keeping their relative order.
    pub fn project<'a, I>(filter: CatalogFilter, items: I) -> Self
    where
        I: IntoIterator<Item = &'a CatalogItem>,
    {
        Self {
            filter,
            items: items
                .into_iter()
                .filter(|item| filter.matches(item))
                .cloned()
                .collect(),
        }
    }

    pub fn filter(&self) -> CatalogFilter {
        self.filter
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a CatalogView {
    type Item = &'a CatalogItem;
    type IntoIter = std::slice::Iter<'a, CatalogItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
