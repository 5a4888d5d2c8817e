//! Where the list of stored snapshot dates comes from.
//!
//! [`IndexBacked`] answers from the index object (one cheap read).
//! [`ListingBacked`] answers from a full prefix listing of the store and
//! is the degraded path, used when the index is empty or found stale.

use async_trait::async_trait;

use super::{RepositoryError, SnapshotRepository};
use crate::domain::{SnapshotDate, SnapshotIndex};

/// Which implementation produced a date list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Dates read from the snapshot index.
    IndexBacked,
    /// Dates read from an authoritative store listing.
    ListingBacked,
}

/// Provider of stored snapshot dates, newest first.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> SourceKind;

    /// Stored snapshot dates sorted descending.
    async fn dates(&self) -> Result<Vec<SnapshotDate>, RepositoryError>;
}

/// Dates taken from an already-loaded index.
#[derive(Debug, Clone)]
pub struct IndexBacked {
    index: SnapshotIndex,
}

impl IndexBacked {
    /// Wraps a loaded index.
    #[must_use]
    pub fn new(index: SnapshotIndex) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SnapshotSource for IndexBacked {
    fn kind(&self) -> SourceKind {
        SourceKind::IndexBacked
    }

    async fn dates(&self) -> Result<Vec<SnapshotDate>, RepositoryError> {
        Ok(self.index.dates())
    }
}

/// Dates taken from listing the store.
#[derive(Debug, Clone, Copy)]
pub struct ListingBacked<'a> {
    repository: &'a SnapshotRepository,
}

impl<'a> ListingBacked<'a> {
    /// Lists through `repository`.
    #[must_use]
    pub fn new(repository: &'a SnapshotRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl SnapshotSource for ListingBacked<'_> {
    fn kind(&self) -> SourceKind {
        SourceKind::ListingBacked
    }

    async fn dates(&self) -> Result<Vec<SnapshotDate>, RepositoryError> {
        self.repository.list_available_dates().await
    }
}
