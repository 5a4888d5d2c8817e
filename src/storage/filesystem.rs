//! Object store rooted at a local directory.
//!
//! Keys map to relative paths (`snapshots/2025-01-01.json` →
//! `{root}/snapshots/2025-01-01.json`). Writes go to a dot-prefixed
//! temporary file and are renamed into place, so readers never observe a
//! partially written object. Create-only writes hard-link the temporary
//! file into place, which fails if the target already exists.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;

use super::{ListPage, ObjectStore, StoreError, paginate};
use crate::storage::memory::DEFAULT_PAGE_SIZE;

/// Filesystem-backed object store.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Recursively collects every object key below the root.
    async fn all_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(StoreError::Io {
                        key: dir.display().to_string(),
                        source,
                    });
                }
            };
            loop {
                let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                    key: dir.display().to_string(),
                    source,
                })?;
                let Some(entry) = entry else {
                    break;
                };
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|source| StoreError::Io {
                    key: path.display().to_string(),
                    source,
                })?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        self.ensure_parent(key, &path).await?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let tmp = temp_path(&path);
        fs::write(&tmp, &body).await.map_err(io_err)?;
        fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        self.ensure_parent(key, &path).await?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let tmp = temp_path(&path);
        fs::write(&tmp, &body).await.map_err(io_err)?;
        // Linking fails atomically when the target exists.
        let linked = fs::hard_link(&tmp, &path).await;
        let _ = fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(key.to_string()))
            }
            Err(err) => Err(io_err(err)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn list(&self, prefix: &str, cursor: Option<String>) -> Result<ListPage, StoreError> {
        let keys = self.all_keys().await?;
        let matching = keys.iter().filter(|k| k.starts_with(prefix));
        Ok(paginate(matching, cursor.as_deref(), self.page_size))
    }
}
