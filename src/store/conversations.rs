//! Conversation store — per-session in-flight post conversations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DatabaseError;
use crate::form::Conversation;

/// Backend-agnostic storage for conversations, keyed by session.
///
/// Callers load a conversation when a message arrives, apply exactly one
/// transition and save it back before handling the next message.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Get the conversation for a session, if one is in flight.
    async fn load(&self, session: &str) -> Result<Option<Conversation>, DatabaseError>;

    /// Insert or replace a conversation.
    async fn save(&self, conversation: &Conversation) -> Result<(), DatabaseError>;

    /// Remove a conversation. Returns whether one existed.
    async fn remove(&self, session: &str) -> Result<bool, DatabaseError>;

    /// Conversations whose last activity is older than `cutoff`.
    async fn idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Conversation>, DatabaseError>;
}

/// In-memory store. Conversations do not survive a restart.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
    /// Most conversations kept at once; `None` is unbounded.
    capacity: Option<usize>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses new sessions once `limit` are in flight.
    /// Updates to sessions already stored always succeed.
    pub fn with_capacity(limit: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            capacity: Some(limit),
        }
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, session: &str) -> Result<Option<Conversation>, DatabaseError> {
        Ok(self.conversations.read().await.get(session).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), DatabaseError> {
        debug!(
            session = %conversation.session,
            step = %conversation.step,
            "Saving conversation"
        );
        let mut conversations = self.conversations.write().await;
        if let Some(limit) = self.capacity {
            if conversations.len() >= limit && !conversations.contains_key(&conversation.session) {
                return Err(DatabaseError::Full { limit });
            }
        }
        conversations.insert(conversation.session.clone(), conversation.clone());
        Ok(())
    }

    async fn remove(&self, session: &str) -> Result<bool, DatabaseError> {
        Ok(self.conversations.write().await.remove(session).is_some())
    }

    async fn idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Conversation>, DatabaseError> {
        Ok(self
            .conversations
            .read()
            .await
            .values()
            .filter(|c| c.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{ChatTarget, FieldKey, FlowStep};

    fn conv(session: &str) -> Conversation {
        Conversation::new(session, ChatTarget::new("test", session))
    }

    #[tokio::test]
    async fn save_and_load() {
        let store = MemoryConversationStore::new();
        assert!(store.is_empty().await);

        let mut c = conv("test:1");
        c.step = FlowStep::Field(1);
        c.answers.insert(FieldKey::Title, "PolyNite".into());
        store.save(&c).await.unwrap();

        let loaded = store.load("test:1").await.unwrap().unwrap();
        assert_eq!(loaded.id, c.id);
        assert_eq!(loaded.step, FlowStep::Field(1));
        assert_eq!(loaded.answer(FieldKey::Title), Some("PolyNite"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = MemoryConversationStore::new();
        let mut a = conv("test:a");
        a.answers.insert(FieldKey::Title, "A".into());
        let b = conv("test:b");
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        let loaded_b = store.load("test:b").await.unwrap().unwrap();
        assert!(loaded_b.answers.is_empty());
        assert!(store.load("test:c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces() {
        let store = MemoryConversationStore::new();
        let mut c = conv("test:1");
        store.save(&c).await.unwrap();
        c.step = FlowStep::Confirmation;
        store.save(&c).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load("test:1").await.unwrap().unwrap();
        assert_eq!(loaded.step, FlowStep::Confirmation);
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let store = MemoryConversationStore::new();
        store.save(&conv("test:1")).await.unwrap();
        assert!(store.remove("test:1").await.unwrap());
        assert!(!store.remove("test:1").await.unwrap());
    }

    #[tokio::test]
    async fn capacity_refuses_new_sessions_only() {
        let store = MemoryConversationStore::with_capacity(1);
        let mut first = conv("test:1");
        store.save(&first).await.unwrap();

        let err = store.save(&conv("test:2")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Full { limit: 1 }));
        assert!(store.load("test:2").await.unwrap().is_none());

        // The stored session can still be updated.
        first.step = FlowStep::Field(2);
        store.save(&first).await.unwrap();
        assert_eq!(store.len().await, 1);

        // Removing frees the slot.
        store.remove("test:1").await.unwrap();
        store.save(&conv("test:2")).await.unwrap();
    }

    #[tokio::test]
    async fn idle_since_filters_by_activity() {
        let store = MemoryConversationStore::new();
        let mut old = conv("test:old");
        old.updated_at = Utc::now() - chrono::Duration::hours(2);
        let fresh = conv("test:fresh");
        store.save(&old).await.unwrap();
        store.save(&fresh).await.unwrap();

        let idle = store
            .idle_since(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].session, "test:old");
    }
}
