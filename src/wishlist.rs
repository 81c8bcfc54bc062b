use crate::session::{ApiError, SessionClient};
use crate::store::ClientStateStore;
use crate::types::events::{EventBus, Toast};
use crate::types::wishlist::{WishlistEntry, WishlistAddRequest};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Keeps the local wishlist cache and the remote authoritative list
/// converged. Local mutations are optimistic: the cache and the persisted
/// per-user blob are updated immediately, the remote sync is fire-and-
/// forget. The remote list wins on `load_remote`, except when a local
/// mutation raced it.
pub struct WishlistReconciler {
    session: Arc<SessionClient>,
    store: Arc<dyn ClientStateStore>,
    bus: Arc<EventBus>,

    bound_user: RwLock<Option<i64>>,
    cache: RwLock<Vec<WishlistEntry>>,
    /// Bumped on every local mutation; a remote load discards its response
    /// when this moved while the request was in flight.
    mutation_seq: AtomicU64,
}

impl WishlistReconciler {
    pub fn new(
        session: Arc<SessionClient>,
        store: Arc<dyn ClientStateStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session,
            store,
            bus,
            bound_user: RwLock::new(None),
            cache: RwLock::new(Vec::new()),
            mutation_seq: AtomicU64::new(0),
        }
    }

    /// Binds the reconciler to a user and hydrates the cache from the
    /// persisted per-user blob (stale but instantly available).
    pub async fn bind_user(&self, user_id: i64) {
        *self.bound_user.write().unwrap() = Some(user_id);
        match self.store.load_wishlist(user_id).await {
            Ok(entries) => *self.cache.write().unwrap() = entries,
            Err(e) => {
                warn!(target: "Wishlist", "Failed to hydrate cache for user {user_id}: {e}");
            }
        }
    }

    /// Drops the user binding and the in-memory cache. The persisted blob
    /// stays; it is keyed by user id and cannot leak into another session.
    pub fn unbind(&self) {
        *self.bound_user.write().unwrap() = None;
        self.cache.write().unwrap().clear();
        self.mutation_seq.fetch_add(1, Ordering::SeqCst);
    }

    /// Local cache lookup; never touches the network.
    pub fn is_wishlisted(&self, product_id: i64) -> bool {
        self.cache
            .read()
            .unwrap()
            .iter()
            .any(|e| e.product_id == product_id)
    }

    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.cache.read().unwrap().clone()
    }

    /// Optimistic toggle: flips local membership, persists the cache, emits
    /// feedback, and syncs the remote list best-effort in the background.
    /// A failed remote sync is logged and deliberately not rolled back:
    /// local-first UX over strict consistency.
    pub async fn toggle(&self, entry: WishlistEntry) {
        let product_id = entry.product_id;
        let name = entry.name.clone();

        let (added, snapshot) = {
            let mut cache = self.cache.write().unwrap();
            let existed = cache.iter().any(|e| e.product_id == product_id);
            if existed {
                cache.retain(|e| e.product_id != product_id);
            } else {
                cache.push(entry);
            }
            (!existed, cache.clone())
        };
        self.mutation_seq.fetch_add(1, Ordering::SeqCst);

        if added {
            self.bus.emit_toast(Toast::success(format!("{name} added to Wishlist")));
        } else {
            self.bus.emit_toast(Toast::error(format!("{name} removed from Wishlist")));
        }

        self.persist(&snapshot).await;

        if !self.session.is_authenticated().await {
            return;
        }
        let session = self.session.clone();
        tokio::spawn(async move {
            let result: Result<serde_json::Value, ApiError> = if added {
                session
                    .post_json(
                        "/wishlist/add",
                        serde_json::to_value(WishlistAddRequest { product_id })
                            .expect("request serializes"),
                    )
                    .await
            } else {
                session
                    .delete_json(&format!("/wishlist/remove/{product_id}"))
                    .await
            };
            if let Err(e) = result {
                warn!(target: "Wishlist", "Remote sync for product {product_id} failed: {e}");
            }
        });
    }

    /// Replaces the local cache with the remote authoritative list. A
    /// network failure leaves the existing cache untouched, and a response
    /// that arrives after a newer local mutation is discarded.
    pub async fn load_remote(&self) -> Result<(), ApiError> {
        let Some(user_id) = *self.bound_user.read().unwrap() else {
            return Err(ApiError::Unauthenticated);
        };

        let seq_before = self.mutation_seq.load(Ordering::SeqCst);
        let remote: Vec<WishlistEntry> = match self.session.get_json("/wishlist/user").await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(target: "Wishlist", "Remote load failed, keeping cached list: {e}");
                return Err(e);
            }
        };

        if self.mutation_seq.load(Ordering::SeqCst) != seq_before {
            debug!(target: "Wishlist", "Discarding stale remote wishlist for user {user_id}");
            return Ok(());
        }

        *self.cache.write().unwrap() = remote.clone();
        self.persist(&remote).await;
        Ok(())
    }

    async fn persist(&self, entries: &[WishlistEntry]) {
        let Some(user_id) = *self.bound_user.read().unwrap() else {
            return;
        };
        if let Err(e) = self.store.save_wishlist(user_id, entries).await {
            warn!(target: "Wishlist", "Failed to persist cache for user {user_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::MockHttpClient;
    use std::time::Duration;

    fn entry(product_id: i64, name: &str) -> WishlistEntry {
        WishlistEntry {
            product_id,
            user_id: 9,
            name: name.to_string(),
            price: 10.0,
            condition: None,
            description: None,
            rating: 0.0,
        }
    }

    async fn reconciler(http: Arc<MockHttpClient>) -> WishlistReconciler {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionClient::new(
            "http://test",
            Duration::from_secs(1),
            http,
            store.clone(),
            bus.clone(),
        ));
        session
            .attach(
                "tok".to_string(),
                crate::types::user::AuthUser {
                    user_id: 1,
                    username: "buyer".to_string(),
                    email: None,
                },
            )
            .await
            .unwrap();
        let r = WishlistReconciler::new(session, store, bus);
        r.bind_user(1).await;
        r
    }

    #[tokio::test]
    async fn double_toggle_restores_original_membership() {
        let r = reconciler(Arc::new(MockHttpClient::new())).await;

        assert!(!r.is_wishlisted(5));
        r.toggle(entry(5, "lamp")).await;
        assert!(r.is_wishlisted(5));
        r.toggle(entry(5, "lamp")).await;
        assert!(!r.is_wishlisted(5));
    }

    #[tokio::test]
    async fn failed_remote_load_keeps_existing_cache() {
        let http = Arc::new(MockHttpClient::new());
        let r = reconciler(http.clone()).await;
        r.toggle(entry(5, "lamp")).await;

        // No response scripted for /wishlist/user: the session sees a
        // transport failure.
        assert!(r.load_remote().await.is_err());
        assert!(r.is_wishlisted(5));
    }

    #[tokio::test]
    async fn remote_load_failure_without_auth_is_unauthenticated() {
        let http = Arc::new(MockHttpClient::new());
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionClient::new(
            "http://test",
            Duration::from_secs(1),
            http,
            store.clone(),
            bus.clone(),
        ));
        let r = WishlistReconciler::new(session, store, bus);
        assert!(matches!(
            r.load_remote().await,
            Err(ApiError::Unauthenticated)
        ));
    }
}
