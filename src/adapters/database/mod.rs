pub mod message_repo;
pub mod records;
pub mod user_repo;

use crate::config::DatabaseConfig;
use crate::domain::message::{Conversation, Message, NewMessage, UnreadCounts};
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

pub use message_repo::MessageRepository;
pub use user_repo::UserRepository;

pub type DbPool = Pool<Postgres>;

/// Durable, ordered record of direct messages.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persists a new unread message, assigning its id and creation timestamp.
    ///
    /// Fails with `AppError::NotFound` if either participant does not exist.
    async fn create(&self, message: NewMessage) -> Result<Message>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>>;

    /// All messages of a conversation, oldest first; ties keep insertion order.
    async fn find_conversation(&self, conversation: Conversation) -> Result<Vec<Message>>;

    /// Atomically flags every unread message from `sender_id` to `receiver_id` as read.
    /// Returns the number of messages that changed.
    async fn mark_read(&self, receiver_id: Uuid, sender_id: Uuid) -> Result<u64>;

    async fn unread_counts(&self, receiver_id: Uuid) -> Result<UnreadCounts>;

    /// Hard-deletes a message. Returns `false` if it was already gone.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

/// Read-only view of the accounts owned by the identity service.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    async fn exists(&self, user_id: Uuid) -> Result<bool>;

    async fn list_except(&self, user_id: Uuid) -> Result<Vec<User>>;
}

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await
}
