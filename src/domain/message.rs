use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// A persisted direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    /// Reference URL of the attached image; raw bytes are never stored.
    pub image: Option<String>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Whether the message may still be retracted at `now`.
    ///
    /// The window is inclusive: a message exactly `window` old is still retractable.
    #[must_use]
    pub fn is_retractable_at(&self, now: OffsetDateTime, window: Duration) -> bool {
        now - self.created_at <= window
    }

    #[must_use]
    pub fn conversation(&self) -> Conversation {
        Conversation::between(self.sender_id, self.receiver_id)
    }
}

/// A message about to be written; the store assigns id, timestamp and read flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
}

/// The unordered pair of users a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conversation {
    low: Uuid,
    high: Uuid,
}

impl Conversation {
    #[must_use]
    pub fn between(a: Uuid, b: Uuid) -> Self {
        if a <= b { Self { low: a, high: b } } else { Self { low: b, high: a } }
    }

    #[must_use]
    pub const fn members(&self) -> (Uuid, Uuid) {
        (self.low, self.high)
    }

    #[must_use]
    pub fn includes(&self, message: &Message) -> bool {
        message.conversation() == *self
    }
}

/// Unread message count per sender, for a single receiver.
pub type UnreadCounts = BTreeMap<Uuid, i64>;

/// Tells the original sender that the receiver has read their messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNotice {
    pub message_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_at(created_at: OffsetDateTime) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            text: Some("hi".to_string()),
            image: None,
            is_read: false,
            created_at,
        }
    }

    #[test]
    fn test_conversation_is_unordered() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(Conversation::between(a, b), Conversation::between(b, a));
        assert_ne!(Conversation::between(a, b), Conversation::between(a, Uuid::new_v4()));
    }

    #[test]
    fn test_conversation_includes_both_directions() {
        let msg = message_at(OffsetDateTime::now_utc());
        let forward = Conversation::between(msg.sender_id, msg.receiver_id);
        let backward = Conversation::between(msg.receiver_id, msg.sender_id);
        assert!(forward.includes(&msg));
        assert!(backward.includes(&msg));
        assert!(!Conversation::between(msg.sender_id, Uuid::new_v4()).includes(&msg));
    }

    #[test]
    fn test_retraction_window_boundary() {
        let created = OffsetDateTime::now_utc();
        let msg = message_at(created);
        let window = Duration::hours(1);

        assert!(msg.is_retractable_at(created, window));
        assert!(msg.is_retractable_at(created + window, window));
        assert!(!msg.is_retractable_at(created + window + Duration::seconds(1), window));
    }

    #[test]
    fn test_message_json_shape() {
        let msg = message_at(OffsetDateTime::UNIX_EPOCH);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["senderId"], msg.sender_id.to_string());
        assert_eq!(value["receiverId"], msg.receiver_id.to_string());
        assert_eq!(value["isRead"], false);
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
        assert!(value["image"].is_null());
    }
}
