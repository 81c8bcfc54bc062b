use crate::types::wishlist::SoldNotification;
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// Transient user-visible feedback, the crate-level stand-in for a toast.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
}

impl Toast {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Warning,
            text: text.into(),
        }
    }
}

/// Emitted when the session is torn down, either explicitly or because a
/// credential refresh failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedOut;

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event type.
        /// Subscribers that lag simply miss events; nothing blocks on them.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Session events
    (logged_out, Arc<LoggedOut>),

    // Notification events
    (unread_count, u32),
    (wishlist_sold, Arc<SoldNotification>),

    // Messaging events
    (conversation_read, i64),

    // UI feedback
    (toast, Arc<Toast>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Fire-and-forget send; a send only fails when nobody subscribes,
    /// which is fine for every channel here.
    pub(crate) fn emit_toast(&self, toast: Toast) {
        let _ = self.toast.send(Arc::new(toast));
    }
}
