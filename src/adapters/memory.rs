use crate::adapters::database::{MessageStore, UserDirectory};
use crate::domain::message::{Conversation, Message, NewMessage, UnreadCounts};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<Uuid, User>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    messages: Vec<Message>,
}

/// Process-local message store with the same semantics as the Postgres repositories.
///
/// Every operation takes the lock once, so bulk updates are atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<Message> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&message.sender_id) || !state.users.contains_key(&message.receiver_id) {
            return Err(AppError::NotFound);
        }

        let stored = Message {
            id: Uuid::new_v4(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text,
            image: message.image,
            is_read: false,
            created_at: OffsetDateTime::now_utc(),
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.state.read().await.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn find_conversation(&self, conversation: Conversation) -> Result<Vec<Message>> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state.messages.iter().filter(|m| conversation.includes(m)).cloned().collect();
        // Stable sort keeps insertion order among equal timestamps.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn mark_read(&self, receiver_id: Uuid, sender_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.receiver_id == receiver_id && m.sender_id == sender_id && !m.is_read)
        {
            message.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn unread_counts(&self, receiver_id: Uuid) -> Result<UnreadCounts> {
        let state = self.state.read().await;
        let mut counts = UnreadCounts::new();
        for message in state.messages.iter().filter(|m| m.receiver_id == receiver_id && !m.is_read) {
            *counts.entry(message.sender_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        Ok(state.messages.len() < before)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn exists(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.users.contains_key(&user_id))
    }

    async fn list_except(&self, user_id: Uuid) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().filter(|u| u.id != user_id).cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}
