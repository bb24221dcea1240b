use crate::adapters::database::MessageStore;
use crate::domain::event::LiveEvent;
use crate::domain::message::{ReadReceipt, UnreadCounts};
use crate::error::Result;
use crate::services::delivery::DeliveryRouter;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    marked_read_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            marked_read_total: meter
                .u64_counter("messages_marked_read_total")
                .with_description("Total messages transitioned to read")
                .build(),
        }
    }
}

/// Owns the read flag transitions and the unread aggregates derived from them.
///
/// The persisted flag is authoritative. Clients treat their own counters as a cache and
/// resynchronize through [`ReadStateTracker::unread_counts`] after reconnecting.
#[derive(Clone, Debug)]
pub struct ReadStateTracker {
    store: Arc<dyn MessageStore>,
    router: DeliveryRouter,
    metrics: Metrics,
}

impl ReadStateTracker {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, router: DeliveryRouter) -> Self {
        Self { store, router, metrics: Metrics::new() }
    }

    /// Marks everything `other_party_id` sent to `reader_id` as read and tells the
    /// original sender. Returns how many messages changed; zero is not an error.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails; no receipt is pushed in that case.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(updated = tracing::field::Empty))]
    pub async fn mark_conversation_read(&self, reader_id: Uuid, other_party_id: Uuid) -> Result<u64> {
        let updated = self.store.mark_read(reader_id, other_party_id).await?;
        tracing::Span::current().record("updated", updated);
        self.metrics.marked_read_total.add(updated, &[]);

        let receipt = ReadReceipt { sender_id: other_party_id, receiver_id: reader_id };
        self.router.push(other_party_id, LiveEvent::MessagesRead(receipt));

        Ok(updated)
    }

    /// Unread counts per sender for `user_id` as receiver.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn unread_counts(&self, user_id: Uuid) -> Result<UnreadCounts> {
        self.store.unread_counts(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::adapters::database::MessageStore;
    use crate::domain::event::LiveEvent;
    use crate::domain::message::{Conversation, ReadReceipt};
    use crate::services::test_support::{Harness, drain};

    #[tokio::test]
    async fn test_offline_message_counts_until_read() {
        let h = Harness::new();
        let a = h.user("alice").await;
        let b = h.user("bob").await;

        h.messages.send_message(a, b, Some("hi".into()), None).await.unwrap();

        let counts = h.read_state.unread_counts(b).await.unwrap();
        assert_eq!(counts.get(&a), Some(&1));

        let mut a_rx = h.connect(a);
        let _b_rx = h.connect(b);
        assert_eq!(h.read_state.mark_conversation_read(b, a).await.unwrap(), 1);

        assert!(h.read_state.unread_counts(b).await.unwrap().is_empty());
        assert_eq!(drain(&mut a_rx), vec![LiveEvent::MessagesRead(ReadReceipt { sender_id: a, receiver_id: b })]);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let h = Harness::new();
        let a = h.user("alice").await;
        let b = h.user("bob").await;
        for text in ["one", "two", "three"] {
            h.messages.send_message(a, b, Some(text.into()), None).await.unwrap();
        }

        assert_eq!(h.read_state.mark_conversation_read(b, a).await.unwrap(), 3);
        let first = h.store.find_conversation(Conversation::between(a, b)).await.unwrap();
        assert_eq!(h.read_state.mark_conversation_read(b, a).await.unwrap(), 0);
        let second = h.store.find_conversation(Conversation::between(a, b)).await.unwrap();

        assert_eq!(first, second);
        assert!(second.iter().all(|m| m.is_read));
    }

    #[tokio::test]
    async fn test_mark_read_leaves_own_messages_unread() {
        let h = Harness::new();
        let a = h.user("alice").await;
        let b = h.user("bob").await;
        h.messages.send_message(a, b, Some("to bob".into()), None).await.unwrap();
        h.messages.send_message(b, a, Some("to alice".into()), None).await.unwrap();

        h.read_state.mark_conversation_read(b, a).await.unwrap();

        assert!(h.read_state.unread_counts(b).await.unwrap().is_empty());
        assert_eq!(h.read_state.unread_counts(a).await.unwrap().get(&b), Some(&1));
    }

    #[tokio::test]
    async fn test_counts_group_by_sender() {
        let h = Harness::new();
        let a = h.user("alice").await;
        let b = h.user("bob").await;
        let c = h.user("carol").await;
        h.messages.send_message(a, c, Some("1".into()), None).await.unwrap();
        h.messages.send_message(a, c, Some("2".into()), None).await.unwrap();
        h.messages.send_message(b, c, Some("3".into()), None).await.unwrap();

        let counts = h.read_state.unread_counts(c).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 1);
    }

    #[tokio::test]
    async fn test_receipt_skipped_when_sender_offline() {
        let h = Harness::new();
        let a = h.user("alice").await;
        let b = h.user("bob").await;
        h.messages.send_message(a, b, Some("hi".into()), None).await.unwrap();

        assert_eq!(h.read_state.mark_conversation_read(b, a).await.unwrap(), 1);
        assert!(!h.presence.is_online(a));
    }
}
