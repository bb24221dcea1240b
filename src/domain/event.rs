use crate::domain::message::{DeletedNotice, Message, ReadReceipt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event pushed to a live connection.
///
/// Serialized as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum LiveEvent {
    NewMessage(Message),
    MessagesRead(ReadReceipt),
    MessageDeleted(DeletedNotice),
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<Uuid>),
}

impl LiveEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "newMessage",
            Self::MessagesRead(_) => "messagesRead",
            Self::MessageDeleted(_) => "messageDeleted",
            Self::OnlineUsers(_) => "getOnlineUsers",
        }
    }
}
