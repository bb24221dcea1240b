use crate::domain::event::LiveEvent;
use dashmap::DashMap;
use opentelemetry::{global, metrics::UpDownCounter};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    #[error("connection is gone")]
    Vanished,
    #[error("outbound buffer is full")]
    BufferFull,
}

/// Sending half of a live connection.
///
/// The registry holds the only long-lived clone; dropping it closes the session's receiver.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    session_id: Uuid,
    tx: mpsc::Sender<LiveEvent>,
}

impl ConnectionHandle {
    /// Creates a handle with a bounded outbound buffer and returns the session's receiving end.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { session_id: Uuid::new_v4(), tx }, rx)
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Queues an event without waiting.
    ///
    /// # Errors
    /// Returns `PushError::Vanished` if the session has ended and `PushError::BufferFull`
    /// if the client is not keeping up.
    pub fn send(&self, event: LiveEvent) -> Result<(), PushError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => PushError::BufferFull,
            TrySendError::Closed(_) => PushError::Vanished,
        })
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    online_users: UpDownCounter<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            online_users: meter
                .i64_up_down_counter("presence_online_users")
                .with_description("Number of users with a registered live connection")
                .build(),
        }
    }
}

/// Maps each user to at most one live connection. Last registration wins.
#[derive(Clone, Debug)]
pub struct PresenceRegistry {
    connections: Arc<DashMap<Uuid, ConnectionHandle>>,
    metrics: Metrics,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { connections: Arc::new(DashMap::new()), metrics: Metrics::new() }
    }

    /// Registers a connection, returning the handle it replaced.
    #[tracing::instrument(level = "debug", skip(self, handle), fields(session_id = %handle.session_id))]
    pub fn register(&self, user_id: Uuid, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let previous = self.connections.insert(user_id, handle);
        if previous.is_none() {
            self.metrics.online_users.add(1, &[]);
        }
        previous
    }

    /// Removes whatever connection the user has. No-op if offline.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn unregister(&self, user_id: Uuid) -> bool {
        let removed = self.connections.remove(&user_id).is_some();
        if removed {
            self.metrics.online_users.add(-1, &[]);
        }
        removed
    }

    /// Removes the user's connection only if it is still the given session.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn release(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let removed = self.connections.remove_if(&user_id, |_, handle| handle.session_id == session_id).is_some();
        if removed {
            self.metrics.online_users.add(-1, &[]);
        }
        removed
    }

    #[must_use]
    pub fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.connections.get(&user_id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.connections.contains_key(&user_id)
    }

    #[must_use]
    pub fn online_users(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.connections.iter().map(|entry| *entry.key()).collect();
        users.sort_unstable();
        users
    }

    /// Snapshot of every registered connection.
    #[must_use]
    pub fn handles(&self) -> Vec<(Uuid, ConnectionHandle)> {
        self.connections.iter().map(|entry| (*entry.key(), entry.value().clone())).collect()
    }
}
