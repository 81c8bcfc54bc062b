use crate::store::Result;
use crate::types::user::AuthUser;
use crate::types::wishlist::WishlistEntry;
use async_trait::async_trait;

/// Persisted client-side state: the stored credential, the current-user
/// record, the per-user wishlist cache and the per-user search history.
///
/// None of the blobs carry a schema version; implementations must treat
/// missing or malformed entries as absent rather than failing.
#[async_trait]
pub trait ClientStateStore: Send + Sync {
    async fn load_token(&self) -> Result<Option<String>>;
    async fn save_token(&self, token: &str) -> Result<()>;

    async fn load_user(&self) -> Result<Option<AuthUser>>;
    async fn save_user(&self, user: &AuthUser) -> Result<()>;

    /// Missing cache reads as an empty list.
    async fn load_wishlist(&self, user_id: i64) -> Result<Vec<WishlistEntry>>;
    async fn save_wishlist(&self, user_id: i64, entries: &[WishlistEntry]) -> Result<()>;

    async fn load_search_history(&self, user_id: i64) -> Result<Vec<String>>;
    async fn save_search_history(&self, user_id: i64, history: &[String]) -> Result<()>;

    /// Drops the credential and current-user record. Per-user caches are
    /// keyed by user id and safe to keep across sessions, so they stay.
    async fn clear_session(&self) -> Result<()>;
}
