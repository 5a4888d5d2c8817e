//! Persistence for the player → country directory (`countries.json`).

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{COUNTRIES_KEY, RepositoryError, log_excerpt};
use crate::domain::{CountryCode, CountryDirectory};
use crate::storage::{ObjectStore, StoreError};

/// Reads and updates the country directory object.
///
/// Updates are read-merge-write against the freshest stored copy, so a
/// background registration of new names never drops a code set by an
/// operator in the meantime (within this process).
#[derive(Debug)]
pub struct CountryDirectoryStore {
    store: Arc<dyn ObjectStore>,
    write_lock: Mutex<()>,
}

impl CountryDirectoryStore {
    /// Creates a directory store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the directory; missing or unreadable means empty.
    pub async fn load(&self) -> CountryDirectory {
        match self.read().await {
            Ok(directory) => directory,
            Err(err) => {
                tracing::warn!(error = %err, "country directory unreadable, using empty directory");
                CountryDirectory::new()
            }
        }
    }

    async fn read(&self) -> Result<CountryDirectory, RepositoryError> {
        match self.store.get(COUNTRIES_KEY).await {
            Ok(body) => Ok(serde_json::from_slice(&body)?),
            Err(StoreError::NotFound(_)) => Ok(CountryDirectory::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Validates and overwrites the stored directory.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidDirectory`] without writing if an
    /// entry is malformed, or the store error if the write fails.
    pub async fn save(&self, directory: &CountryDirectory) -> Result<(), RepositoryError> {
        if let Err(errors) = directory.validate() {
            tracing::warn!(
                ?errors,
                payload = %log_excerpt(directory),
                "refusing to save invalid country directory"
            );
            return Err(RepositoryError::InvalidDirectory(errors));
        }
        let body = serde_json::to_vec_pretty(directory)?;
        self.store.put(COUNTRIES_KEY, body).await?;
        Ok(())
    }

    /// Adds each of `names` as unknown if not already present.
    ///
    /// Returns how many names were new. Nothing is written when every
    /// name is already known.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored directory cannot be read (so it is
    /// not overwritten blindly) or the write fails.
    pub async fn register_unknown(&self, names: &[String]) -> Result<usize, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut directory = self.read().await?;
        let added = names
            .iter()
            .filter(|name| directory.insert_unknown(name))
            .count();
        if added > 0 {
            self.save(&directory).await?;
            tracing::info!(added, total = directory.len(), "registered new players in country directory");
        }
        Ok(added)
    }

    /// Sets the country for one player, adding the player if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored directory cannot be read or written.
    pub async fn set_country(
        &self,
        name: &str,
        code: &CountryCode,
    ) -> Result<CountryDirectory, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut directory = self.read().await?;
        directory.set(name, code);
        self.save(&directory).await?;
        tracing::info!(player = name, country = ?code, "country updated");
        Ok(directory)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;

    fn setup() -> (Arc<InMemoryObjectStore>, CountryDirectoryStore) {
        let store = Arc::new(InMemoryObjectStore::new());
        let dir = CountryDirectoryStore::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
        (store, dir)
    }

    #[tokio::test]
    async fn missing_directory_loads_empty() {
        let (_, dir) = setup();
        assert!(dir.load().await.is_empty());
    }

    #[tokio::test]
    async fn register_unknown_only_adds_new_names() {
        let (store, dir) = setup();
        let names = vec!["Alice".to_string(), "Bob".to_string()];
        assert_eq!(dir.register_unknown(&names).await.ok(), Some(2));
        assert_eq!(dir.register_unknown(&names).await.ok(), Some(0));
        assert_eq!(store.put_call_count(), 1);
        assert_eq!(dir.load().await.get("Alice"), Some(CountryCode::Unknown));
    }

    #[tokio::test]
    async fn register_unknown_preserves_operator_edits() {
        let (_, dir) = setup();
        let code = CountryCode::Code("pl".to_string());
        assert!(dir.set_country("Alice", &code).await.is_ok());
        assert!(dir.register_unknown(&["Alice".to_string()]).await.is_ok());
        assert_eq!(dir.load().await.get("Alice"), Some(code));
    }

    #[tokio::test]
    async fn unreadable_directory_is_not_overwritten() {
        let (store, dir) = setup();
        let _ = store.put(COUNTRIES_KEY, b"[broken".to_vec()).await;
        let result = dir.register_unknown(&["Alice".to_string()]).await;
        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
        let Ok(body) = store.get(COUNTRIES_KEY).await else {
            panic!("directory vanished");
        };
        assert_eq!(body, b"[broken");
    }

    #[tokio::test]
    async fn failed_write_surfaces_error() {
        let (store, dir) = setup();
        store.fail_writes_to(COUNTRIES_KEY).await;
        let result = dir.register_unknown(&["Alice".to_string()]).await;
        assert!(matches!(result, Err(RepositoryError::Store(_))));
    }
}
