use crate::session::{ApiError, SessionClient};
use crate::types::events::EventBus;
use crate::types::messaging::{
    ConversationDetail, ConversationSummary, CreateConversationRequest,
    CreateConversationResponse, Message,
};
use dashmap::DashMap;
use log::{debug, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

const MARK_READ_ATTEMPTS: u32 = 3;
const MARK_READ_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error("cannot start a conversation with yourself")]
    SelfMessage,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Load state of one conversation. Absent from the map means unloaded;
/// `Error` is recoverable by selecting the conversation again.
#[derive(Debug, Clone)]
pub enum ConversationState {
    Loading,
    Loaded {
        conversation: ConversationDetail,
        messages: Vec<Message>,
    },
    Error(String),
}

/// Read-through cache over the messaging endpoints, with read-state
/// tracking. Every mutation is followed by an explicit refetch instead of
/// optimistic patching, so local state never drifts from server-assigned
/// ordering.
pub struct ConversationStore {
    session: Arc<SessionClient>,
    bus: Arc<EventBus>,
    conversations: RwLock<Vec<ConversationSummary>>,
    states: DashMap<i64, ConversationState>,
}

impl ConversationStore {
    pub fn new(session: Arc<SessionClient>, bus: Arc<EventBus>) -> Self {
        Self {
            session,
            bus,
            conversations: RwLock::new(Vec::new()),
            states: DashMap::new(),
        }
    }

    /// Fetches and caches the conversation summaries for the current user,
    /// newest activity first. The server already orders them; the sort
    /// here re-asserts the same key rather than trusting response order.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, MessagingError> {
        let mut summaries: Vec<ConversationSummary> =
            self.session.get_json("/messaging/conversations").await?;
        summaries.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then(b.conversation_id.cmp(&a.conversation_id))
        });
        *self.conversations.write().await = summaries.clone();
        Ok(summaries)
    }

    pub async fn cached_conversations(&self) -> Vec<ConversationSummary> {
        self.conversations.read().await.clone()
    }

    pub fn conversation_state(&self, id: i64) -> Option<ConversationState> {
        self.states.get(&id).map(|s| s.clone())
    }

    /// Loads a conversation's metadata and messages, then marks it read in
    /// the background. Messages are usable as soon as this returns; the
    /// unread badge only clears (via the `conversation_read` event) once
    /// the mark-read call actually succeeds.
    pub async fn select_conversation(self: &Arc<Self>, id: i64) -> Result<(), MessagingError> {
        self.states.insert(id, ConversationState::Loading);

        let loaded = self.fetch_conversation(id).await;
        match loaded {
            Ok((conversation, messages)) => {
                self.states.insert(
                    id,
                    ConversationState::Loaded {
                        conversation,
                        messages,
                    },
                );
            }
            Err(e) => {
                self.states
                    .insert(id, ConversationState::Error(e.to_string()));
                return Err(e);
            }
        }

        let store = self.clone();
        tokio::spawn(async move {
            store.mark_read_with_retry(id).await;
        });
        Ok(())
    }

    async fn fetch_conversation(
        &self,
        id: i64,
    ) -> Result<(ConversationDetail, Vec<Message>), MessagingError> {
        let conversation: ConversationDetail = self
            .session
            .get_json(&format!("/messaging/conversations/{id}"))
            .await?;
        let messages = self.fetch_messages(id).await?;
        Ok((conversation, messages))
    }

    async fn fetch_messages(&self, id: i64) -> Result<Vec<Message>, MessagingError> {
        let mut messages: Vec<Message> = self
            .session
            .get_json(&format!("/messaging/conversations/{id}/messages"))
            .await?;
        // Server-assigned order: sent time, ties broken by id. Client and
        // server clocks are not assumed synchronized, so arrival order is
        // never used.
        messages.sort_by_key(|m| (m.sent_at, m.message_id));
        Ok(messages)
    }

    /// Best-effort mark-read. Retries a few times before giving up; the
    /// badge is only cleared after a confirmed success, so a silently
    /// failing call can never make it under-report.
    async fn mark_read_with_retry(&self, id: i64) {
        for attempt in 1..=MARK_READ_ATTEMPTS {
            let result: Result<serde_json::Value, ApiError> = self
                .session
                .post_json(&format!("/messaging/conversations/{id}/read"), json!({}))
                .await;
            match result {
                Ok(_) => {
                    debug!(target: "Messaging", "Conversation {id} marked read");
                    let _ = self.bus.conversation_read.send(id);
                    return;
                }
                Err(e) if attempt < MARK_READ_ATTEMPTS => {
                    debug!(target: "Messaging", "Mark-read for {id} failed (attempt {attempt}): {e}");
                    tokio::time::sleep(MARK_READ_BACKOFF * attempt).await;
                }
                Err(e) => {
                    warn!(target: "Messaging", "Giving up marking conversation {id} read: {e}");
                }
            }
        }
    }

    /// Sends a message and refetches the conversation's messages, so the
    /// displayed thread always carries server-assigned ordering.
    pub async fn send_message(&self, id: i64, text: &str) -> Result<(), MessagingError> {
        if text.trim().is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        let _: serde_json::Value = self
            .session
            .post_json(
                &format!("/messaging/conversations/{id}/messages"),
                json!({ "message_text": text }),
            )
            .await?;

        let messages = self.fetch_messages(id).await?;
        if let Some(mut state) = self.states.get_mut(&id) {
            if let ConversationState::Loaded {
                messages: cached, ..
            } = state.value_mut()
            {
                *cached = messages;
            }
        }
        Ok(())
    }

    /// Starts (or, server-side, rejoins) a conversation about a product.
    /// The backend reuses the existing conversation for the same product
    /// and participant pair, so repeating this call is safe.
    pub async fn create_conversation(
        &self,
        product_id: i64,
        recipient_id: i64,
        subject: &str,
        initial_message: &str,
    ) -> Result<i64, MessagingError> {
        if initial_message.trim().is_empty() {
            return Err(MessagingError::EmptyMessage);
        }
        if let Some(user) = self.session.current_user().await
            && user.user_id == recipient_id
        {
            return Err(MessagingError::SelfMessage);
        }

        let request = CreateConversationRequest {
            product_id,
            recipient_id,
            subject: subject.to_string(),
            initial_message: initial_message.to_string(),
        };
        let response: CreateConversationResponse = self
            .session
            .post_json(
                "/messaging/conversations",
                serde_json::to_value(&request)
                    .map_err(|e| ApiError::Malformed(e.to_string()))?,
            )
            .await?;
        Ok(response.conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::MockHttpClient;
    use crate::types::user::AuthUser;

    async fn store_with(http: Arc<MockHttpClient>) -> Arc<ConversationStore> {
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionClient::new(
            "http://test",
            Duration::from_secs(1),
            http,
            Arc::new(MemoryStore::new()),
            bus.clone(),
        ));
        session
            .attach(
                "tok".to_string(),
                AuthUser {
                    user_id: 1,
                    username: "buyer".to_string(),
                    email: None,
                },
            )
            .await
            .unwrap();
        Arc::new(ConversationStore::new(session, bus))
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_a_network_call() {
        let http = Arc::new(MockHttpClient::new());
        let store = store_with(http.clone()).await;

        let result = store.send_message(4, "   \n\t ").await;
        assert!(matches!(result, Err(MessagingError::EmptyMessage)));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn self_message_is_rejected_without_a_network_call() {
        let http = Arc::new(MockHttpClient::new());
        let store = store_with(http.clone()).await;

        let result = store.create_conversation(7, 1, "About lamp", "hi").await;
        assert!(matches!(result, Err(MessagingError::SelfMessage)));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn conversations_are_ordered_by_last_activity_descending() {
        let http = Arc::new(MockHttpClient::new());
        http.script_json(
            "GET",
            "/messaging/conversations",
            200,
            &serde_json::json!([
                {"conversation_id": 1, "last_message_at": "2025-05-01 09:00:00"},
                {"conversation_id": 2, "last_message_at": "2025-05-03 09:00:00"},
                {"conversation_id": 3, "last_message_at": "2025-05-02 09:00:00"},
            ]),
        );
        let store = store_with(http).await;

        let summaries = store.list_conversations().await.unwrap();
        assert_eq!(
            summaries.iter().map(|c| c.conversation_id).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
    }

    #[tokio::test]
    async fn messages_sort_by_server_time_then_id() {
        let http = Arc::new(MockHttpClient::new());
        http.script_json(
            "GET",
            "/messaging/conversations/4/messages",
            200,
            &serde_json::json!([
                {"message_id": 12, "conversation_id": 4, "sender_id": 2,
                 "message_text": "b", "sent_at": "2025-05-01 10:00:00"},
                {"message_id": 11, "conversation_id": 4, "sender_id": 1,
                 "message_text": "a", "sent_at": "2025-05-01 10:00:00"},
                {"message_id": 13, "conversation_id": 4, "sender_id": 1,
                 "message_text": "c", "sent_at": "2025-05-01 09:00:00"},
            ]),
        );
        let store = store_with(http).await;

        let messages = store.fetch_messages(4).await.unwrap();
        assert_eq!(
            messages.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![13, 11, 12]
        );
    }
}
