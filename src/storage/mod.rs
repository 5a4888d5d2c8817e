//! Object store abstraction: the persistence substrate.
//!
//! The core assumes only three operations: whole-object `put`, direct
//! `get` by key, and paginated `list` by prefix. Listing is treated as
//! expensive; callers that know a key read it directly.

pub mod filesystem;
pub mod memory;

use std::fmt;

use async_trait::async_trait;

pub use filesystem::FsObjectStore;
pub use memory::InMemoryObjectStore;

/// Errors surfaced by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object exists at the key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A create-only write found an existing object.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The key cannot be mapped onto the backing store.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Local I/O failure.
    #[error("i/o error on {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Remote or injected transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Returns `true` for the expected "nothing stored here" case.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys on this page, in ascending order.
    pub keys: Vec<String>,
    /// Cursor for the next page; `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Key/value blob store addressable by path.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Writes `body` at `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    /// Writes `body` only if nothing exists at `key`.
    ///
    /// Stores without a conditional write fall back to [`ObjectStore::put`]
    /// (last write wins). Stores that support it return
    /// [`StoreError::AlreadyExists`] when the key is taken.
    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.put(key, body).await
    }

    /// Reads the object at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Lists keys under `prefix`, one page at a time.
    async fn list(&self, prefix: &str, cursor: Option<String>) -> Result<ListPage, StoreError>;
}

/// Splits a sorted key set into one page after `cursor`.
pub(crate) fn paginate<'a, I>(keys: I, cursor: Option<&str>, page_size: usize) -> ListPage
where
    I: Iterator<Item = &'a String>,
{
    let mut page: Vec<String> = keys
        .filter(|k| cursor.is_none_or(|c| k.as_str() > c))
        .take(page_size.saturating_add(1))
        .cloned()
        .collect();
    let next_cursor = if page.len() > page_size {
        page.truncate(page_size);
        page.last().cloned()
    } else {
        None
    };
    ListPage {
        keys: page,
        next_cursor,
    }
}
