use crate::adapters::database::records::MessageRecord;
use crate::adapters::database::{DbPool, MessageStore};
use crate::domain::message::{Conversation, Message, NewMessage, UnreadCounts};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(level = "debug", skip(self, message), fields(receiver_id = %message.receiver_id))]
    async fn create(&self, message: NewMessage) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, text, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender_id, receiver_id, text, image, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.text)
        .bind(message.image)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: one of the participants does not exist
                Err(AppError::NotFound)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, receiver_id, text, image, is_read, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_conversation(&self, conversation: Conversation) -> Result<Vec<Message>> {
        let (a, b) = conversation.members();
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, receiver_id, text, image, is_read, created_at
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_read(&self, receiver_id: Uuid, sender_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE receiver_id = $1 AND sender_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(receiver_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn unread_counts(&self, receiver_id: Uuid) -> Result<UnreadCounts> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT sender_id, COUNT(*)
            FROM messages
            WHERE receiver_id = $1 AND is_read = FALSE
            GROUP BY sender_id
            "#,
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
