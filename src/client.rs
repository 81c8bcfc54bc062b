use crate::cart::Cart;
use crate::checkout::CheckoutOrchestrator;
use crate::config::ClientConfig;
use crate::http::HttpClient;
use crate::messaging::ConversationStore;
use crate::notify::NotificationPoller;
use crate::session::{ApiError, SessionClient};
use crate::store::ClientStateStore;
use crate::types::events::EventBus;
use crate::types::user::AuthUser;
use crate::wishlist::WishlistReconciler;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

const SEARCH_HISTORY_LIMIT: usize = 10;

/// Explicit session context for one logged-in user: every component that
/// needs the credential, the caches or the event bus hangs off this
/// object. Initialized at login (or restored at startup), torn down at
/// logout; there is no ambient global state.
pub struct Client {
    pub config: ClientConfig,
    pub bus: Arc<EventBus>,
    pub session: Arc<SessionClient>,
    pub cart: Arc<Cart>,
    pub conversations: Arc<ConversationStore>,
    pub wishlist: Arc<WishlistReconciler>,

    store: Arc<dyn ClientStateStore>,
    shutdown_notifier: Arc<Notify>,
    poller_running: Arc<AtomicBool>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn ClientStateStore>,
    ) -> Arc<Self> {
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionClient::new(
            config.api_url.clone(),
            config.request_timeout,
            http,
            store.clone(),
            bus.clone(),
        ));
        let conversations = Arc::new(ConversationStore::new(session.clone(), bus.clone()));
        let wishlist = Arc::new(WishlistReconciler::new(
            session.clone(),
            store.clone(),
            bus.clone(),
        ));

        Arc::new(Self {
            config,
            bus,
            session,
            cart: Arc::new(Cart::new()),
            conversations,
            wishlist,
            store,
            shutdown_notifier: Arc::new(Notify::new()),
            poller_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Initializes the session after a successful login: installs the
    /// credential, binds the per-user wishlist cache and refreshes it from
    /// the remote authority (best effort; a failure keeps the cached list).
    pub async fn login_with(&self, token: String, user: AuthUser) -> Result<(), ApiError> {
        let user_id = user.user_id;
        self.session.attach(token, user).await?;
        self.wishlist.bind_user(user_id).await;
        if let Err(e) = self.wishlist.load_remote().await {
            warn!(target: "Client", "Initial wishlist load failed: {e}");
        }
        info!(target: "Client", "Session started for user {user_id}");
        Ok(())
    }

    /// Restores a persisted session at startup, if one exists.
    pub async fn restore(&self) -> Result<bool, ApiError> {
        if !self.session.restore().await? {
            return Ok(false);
        }
        if let Some(user) = self.session.current_user().await {
            self.wishlist.bind_user(user.user_id).await;
            if let Err(e) = self.wishlist.load_remote().await {
                warn!(target: "Client", "Initial wishlist load failed: {e}");
            }
        }
        Ok(true)
    }

    /// Spawns the notification poller for this session. At most one poller
    /// runs at a time; repeated calls while one is live are no-ops, so a
    /// remounting caller cannot stack timers.
    pub fn start_notification_poller(self: &Arc<Self>) {
        if self
            .poller_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let poller = Arc::new(NotificationPoller::new(
            self.session.clone(),
            self.bus.clone(),
            self.config.poll_interval,
            self.shutdown_notifier.clone(),
            self.poller_running.clone(),
        ));
        tokio::spawn(poller.poll_loop());
    }

    /// Tears the session down: stops background tasks, drops the in-memory
    /// caches bound to the user and clears the persisted credential.
    pub async fn logout(&self) {
        self.shutdown_notifier.notify_waiters();
        self.wishlist.unbind();
        self.session.logout().await;
        info!(target: "Client", "Session ended");
    }

    /// Builds a checkout flow over the current cart selection.
    pub fn begin_checkout(&self) -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(self.cart.clone(), self.conversations.clone())
    }

    /// Records a search query into the bounded, de-duplicated per-user
    /// history (most recent first).
    pub async fn record_search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        let Some(user) = self.session.current_user().await else {
            return;
        };

        let mut history = match self.store.load_search_history(user.user_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(target: "Client", "Failed to load search history: {e}");
                return;
            }
        };
        history.retain(|q| q != query);
        history.insert(0, query.to_string());
        history.truncate(SEARCH_HISTORY_LIMIT);

        if let Err(e) = self.store.save_search_history(user.user_id, &history).await {
            warn!(target: "Client", "Failed to persist search history: {e}");
        }
    }

    pub async fn search_history(&self) -> Vec<String> {
        let Some(user) = self.session.current_user().await else {
            return Vec::new();
        };
        self.store
            .load_search_history(user.user_id)
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::MockHttpClient;
    use serde_json::json;

    async fn logged_in() -> Arc<Client> {
        let http = Arc::new(MockHttpClient::new());
        http.script_json("GET", "/wishlist/user", 200, &json!([]));
        let client = Client::new(
            ClientConfig {
                api_url: "http://test".to_string(),
                ..Default::default()
            },
            http,
            Arc::new(MemoryStore::new()),
        );
        client
            .login_with(
                "tok".to_string(),
                AuthUser {
                    user_id: 1,
                    username: "buyer".to_string(),
                    email: None,
                },
            )
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn search_history_dedupes_and_keeps_most_recent_first() {
        let client = logged_in().await;

        client.record_search("lamp").await;
        client.record_search("desk").await;
        client.record_search("lamp").await;
        client.record_search("  ").await;

        assert_eq!(client.search_history().await, vec!["lamp", "desk"]);
    }

    #[tokio::test]
    async fn search_history_is_bounded() {
        let client = logged_in().await;

        for i in 0..15 {
            client.record_search(&format!("query {i}")).await;
        }

        let history = client.search_history().await;
        assert_eq!(history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(history[0], "query 14");
        assert_eq!(history[9], "query 5");
    }

    #[tokio::test]
    async fn logged_out_client_has_no_search_history() {
        let client = logged_in().await;
        client.record_search("lamp").await;
        client.logout().await;

        assert!(client.search_history().await.is_empty());
        // Nothing is recorded without a user to key it by.
        client.record_search("desk").await;
        assert!(client.search_history().await.is_empty());
    }
}
