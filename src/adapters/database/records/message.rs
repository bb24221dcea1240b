use crate::domain::message::Message;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
    pub is_read: bool,
    pub created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            text: record.text,
            image: record.image,
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}
