use crate::domain::event::LiveEvent;
use crate::domain::message::Message;
use crate::services::presence::{PresenceRegistry, PushError};
use opentelemetry::{KeyValue, global, metrics::Counter};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    pushes_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            pushes_total: meter
                .u64_counter("delivery_pushes_total")
                .with_description("Live event push attempts by event and outcome")
                .build(),
        }
    }

    fn record(&self, event: &'static str, status: &'static str) {
        self.pushes_total.add(1, &[KeyValue::new("event", event), KeyValue::new("status", status)]);
    }
}

/// Best-effort fan-out of live events to whoever is connected.
///
/// Delivery is never guaranteed: a push to an offline or vanished connection is dropped and
/// the client reconciles through the history and unread-count queries.
#[derive(Clone, Debug)]
pub struct DeliveryRouter {
    presence: PresenceRegistry,
    metrics: Metrics,
}

impl DeliveryRouter {
    #[must_use]
    pub fn new(presence: PresenceRegistry) -> Self {
        Self { presence, metrics: Metrics::new() }
    }

    /// Pushes a freshly persisted message to its receiver, if connected.
    #[tracing::instrument(
        level = "debug",
        skip(self, message),
        fields(message_id = %message.id, receiver_id = %message.receiver_id)
    )]
    pub fn deliver(&self, message: &Message) -> bool {
        let delivered = self.push(message.receiver_id, LiveEvent::NewMessage(message.clone()));
        if !delivered {
            tracing::debug!("Receiver not reachable, message left unread");
        }
        delivered
    }

    /// Pushes an event to a single user. Returns whether it was queued on a live connection.
    pub fn push(&self, user_id: Uuid, event: LiveEvent) -> bool {
        let name = event.name();
        // The handle is cloned out of the registry, so no lock is held while sending.
        let Some(handle) = self.presence.lookup(user_id) else {
            self.metrics.record(name, "offline");
            return false;
        };

        match handle.send(event) {
            Ok(()) => {
                tracing::trace!(%user_id, event = name, "Pushed live event");
                self.metrics.record(name, "delivered");
                true
            }
            Err(PushError::Vanished) => {
                tracing::debug!(%user_id, event = name, "Connection vanished before push");
                self.metrics.record(name, "vanished");
                false
            }
            Err(PushError::BufferFull) => {
                tracing::warn!(%user_id, event = name, "Dropped live event, outbound buffer full");
                self.metrics.record(name, "buffer_full");
                false
            }
        }
    }

    /// Pushes an event to every connected user. Returns how many accepted it.
    pub fn broadcast(&self, event: &LiveEvent) -> usize {
        let name = event.name();
        let mut delivered = 0;
        for (user_id, handle) in self.presence.handles() {
            match handle.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.record(name, "delivered");
                }
                Err(e) => {
                    tracing::debug!(%user_id, error = %e, event = name, "Skipped broadcast target");
                    self.metrics.record(name, "dropped");
                }
            }
        }
        delivered
    }
}
