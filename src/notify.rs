use crate::session::SessionClient;
use crate::types::events::{EventBus, Toast};
use crate::types::messaging::UnreadCountResponse;
use crate::types::wishlist::SoldNotification;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Periodic background check for unread-message counts and newly-sold
/// wishlisted items. One instance runs per active session; the loop exits
/// on the shutdown notifier or, at the latest, one interval after the
/// credential disappears.
pub struct NotificationPoller {
    session: Arc<SessionClient>,
    bus: Arc<EventBus>,
    interval: Duration,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl NotificationPoller {
    pub(crate) fn new(
        session: Arc<SessionClient>,
        bus: Arc<EventBus>,
        interval: Duration,
        shutdown: Arc<Notify>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            bus,
            interval,
            shutdown,
            running,
        }
    }

    /// The main polling loop. This should be spawned as a background task.
    pub(crate) async fn poll_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if !self.session.is_authenticated().await {
                        debug!(target: "Poller", "No credential, exiting poll loop.");
                        break;
                    }
                    // The two checks are independent: a failure of one must
                    // not suppress the other.
                    self.check_unread_count().await;
                    self.check_sold_wishlist_items().await;
                },
                _ = self.shutdown.notified() => {
                    debug!(target: "Poller", "Shutdown signaled, exiting poll loop.");
                    break;
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn check_unread_count(&self) {
        match self
            .session
            .get_json::<UnreadCountResponse>("/messaging/unread-count")
            .await
        {
            Ok(response) => {
                if let Some(error) = response.error {
                    // The backend degrades to {count: 0, error} on its own
                    // failures rather than a non-2xx status.
                    debug!(target: "Poller", "Unread count degraded: {error}");
                }
                let _ = self.bus.unread_count.send(response.count);
            }
            Err(e) => {
                warn!(target: "Poller", "Unread count check failed: {e}");
            }
        }
    }

    async fn check_sold_wishlist_items(&self) {
        match self
            .session
            .get_json::<Vec<SoldNotification>>("/wishlist/notifications")
            .await
        {
            Ok(notifications) => {
                // The server only returns items not yet notified and marks
                // them in the same call, so nothing repeats across polls.
                for item in notifications {
                    self.bus.emit_toast(Toast::warning(format!(
                        "\"{}\" from your wishlist has been sold!",
                        item.name
                    )));
                    let _ = self.bus.wishlist_sold.send(Arc::new(item));
                }
            }
            Err(e) => {
                warn!(target: "Poller", "Wishlist notification check failed: {e}");
            }
        }
    }
}
