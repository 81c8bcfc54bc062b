use crate::store::traits::ClientStateStore;
use crate::store::{Result, StoreError};
use crate::types::user::AuthUser;
use crate::types::wishlist::WishlistEntry;
use async_trait::async_trait;
use log::warn;
use serde::{Serialize, de::DeserializeOwned};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One JSON blob per key under a base directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub async fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let base_path = path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }

    /// Missing file reads as `None`. A file that no longer parses also
    /// reads as `None`: these blobs have no schema version, and an
    /// unreadable cache must never take the client down.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(target: "Store", "Discarding malformed blob {}: {e}", path.display());
                    Ok(None)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(path, data).await.map_err(StoreError::Io)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[async_trait]
impl ClientStateStore for FileStore {
    async fn load_token(&self) -> Result<Option<String>> {
        self.read_json(&self.path_for("token")).await
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        self.write_json(&self.path_for("token"), &token).await
    }

    async fn load_user(&self) -> Result<Option<AuthUser>> {
        self.read_json(&self.path_for("user")).await
    }

    async fn save_user(&self, user: &AuthUser) -> Result<()> {
        self.write_json(&self.path_for("user"), user).await
    }

    async fn load_wishlist(&self, user_id: i64) -> Result<Vec<WishlistEntry>> {
        Ok(self
            .read_json(&self.path_for(&format!("wishlist_{user_id}")))
            .await?
            .unwrap_or_default())
    }

    async fn save_wishlist(&self, user_id: i64, entries: &[WishlistEntry]) -> Result<()> {
        self.write_json(&self.path_for(&format!("wishlist_{user_id}")), &entries)
            .await
    }

    async fn load_search_history(&self, user_id: i64) -> Result<Vec<String>> {
        Ok(self
            .read_json(&self.path_for(&format!("search_history_{user_id}")))
            .await?
            .unwrap_or_default())
    }

    async fn save_search_history(&self, user_id: i64, history: &[String]) -> Result<()> {
        self.write_json(
            &self.path_for(&format!("search_history_{user_id}")),
            &history,
        )
        .await
    }

    async fn clear_session(&self) -> Result<()> {
        self.remove(&self.path_for("token")).await?;
        self.remove(&self.path_for("user")).await
    }
}
