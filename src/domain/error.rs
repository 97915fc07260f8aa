//! Domain Layer - Errors
//!
//! Error taxonomy shared by the model, the store seam and the image pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog-level errors surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CatalogError {
    /// Create parameters rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Intent names an item that is not in the authoritative set
    #[error("Not found: {0}")]
    NotFound(String),
    /// Remote store operation failed
    #[error("Store error: {0}")]
    StoreError(String),
    /// Image download failed
    #[error("Image fetch failed: {0}")]
    ImageFetch(String),
    /// Settings file could not be read, parsed or written
    #[error("Config error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CatalogError::InvalidInput(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        CatalogError::StoreError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CatalogError::Config(msg.into())
    }
}

/// Why a remote record was left out of every view.
///
/// Never surfaced to callers; only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeSkip {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing or mistyped field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is out of range")]
    InvalidField(&'static str),
}
