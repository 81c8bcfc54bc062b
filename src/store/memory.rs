use crate::store::Result;
use crate::store::traits::ClientStateStore;
use crate::types::user::AuthUser;
use crate::types::wishlist::WishlistEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory implementation of [`ClientStateStore`], used in tests.
#[derive(Default)]
pub struct MemoryStore {
    token: Mutex<Option<String>>,
    user: Mutex<Option<AuthUser>>,
    wishlists: Mutex<HashMap<i64, Vec<WishlistEntry>>>,
    search_histories: Mutex<HashMap<i64, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStateStore for MemoryStore {
    async fn load_token(&self) -> Result<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn load_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.user.lock().await.clone())
    }

    async fn save_user(&self, user: &AuthUser) -> Result<()> {
        *self.user.lock().await = Some(user.clone());
        Ok(())
    }

    async fn load_wishlist(&self, user_id: i64) -> Result<Vec<WishlistEntry>> {
        Ok(self
            .wishlists
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_wishlist(&self, user_id: i64, entries: &[WishlistEntry]) -> Result<()> {
        self.wishlists
            .lock()
            .await
            .insert(user_id, entries.to_vec());
        Ok(())
    }

    async fn load_search_history(&self, user_id: i64) -> Result<Vec<String>> {
        Ok(self
            .search_histories
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_search_history(&self, user_id: i64, history: &[String]) -> Result<()> {
        self.search_histories
            .lock()
            .await
            .insert(user_id, history.to_vec());
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        *self.token.lock().await = None;
        *self.user.lock().await = None;
        Ok(())
    }
}
