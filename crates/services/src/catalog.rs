use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use prep_core::model::{ContentId, ContentMeta};

/// Errors from the content-catalog collaborator.
///
/// Enrichment is best-effort: the engine logs these and saves the
/// record without display metadata.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog lookup failed: {0}")]
    Lookup(String),
}

/// Read-only lookup of display metadata for a content item.
///
/// Consulted lazily the first time a progress record lacks its
/// denormalized title/subject fields.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Fetch display metadata, `None` when the item is unknown.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the catalog cannot be queried.
    async fn lookup(&self, content_id: &ContentId) -> Result<Option<ContentMeta>, CatalogError>;
}

/// Fixed in-memory catalog for tests and offline use.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<ContentId, ContentMeta>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, content_id: ContentId, meta: ContentMeta) -> Self {
        self.entries.insert(content_id, meta);
        self
    }
}

#[async_trait]
impl ContentCatalog for StaticCatalog {
    async fn lookup(&self, content_id: &ContentId) -> Result<Option<ContentMeta>, CatalogError> {
        Ok(self.entries.get(content_id).cloned())
    }
}
