use crate::adapters::memory::MemoryStore;
use crate::adapters::storage::MemoryImageStore;
use crate::config::MessagingConfig;
use crate::domain::event::LiveEvent;
use crate::domain::user::User;
use crate::services::delivery::DeliveryRouter;
use crate::services::message_service::MessageService;
use crate::services::presence::{ConnectionHandle, PresenceRegistry};
use crate::services::read_state::ReadStateTracker;
use crate::services::retraction::RetractionHandler;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The core services wired against in-memory adapters.
pub(crate) struct Harness {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) images: Arc<MemoryImageStore>,
    pub(crate) presence: PresenceRegistry,
    pub(crate) messages: MessageService,
    pub(crate) read_state: ReadStateTracker,
    pub(crate) retraction: RetractionHandler,
}

impl Harness {
    pub(crate) fn new() -> Self {
        crate::telemetry::init_test_telemetry();

        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(MemoryImageStore::new());
        let presence = PresenceRegistry::new();
        let router = DeliveryRouter::new(presence.clone());
        let config = MessagingConfig::default();

        let messages = MessageService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&images) as _,
            router.clone(),
            config.clone(),
        );
        let read_state = ReadStateTracker::new(Arc::clone(&store) as _, router.clone());
        let retraction = RetractionHandler::new(Arc::clone(&store) as _, router, &config);

        Self { store, images, presence, messages, read_state, retraction }
    }

    pub(crate) async fn user(&self, name: &str) -> Uuid {
        let user = User::new(name, name);
        let id = user.id;
        self.store.insert_user(user).await;
        id
    }

    pub(crate) fn connect(&self, user_id: Uuid) -> mpsc::Receiver<LiveEvent> {
        let (handle, rx) = ConnectionHandle::channel(16);
        self.presence.register(user_id, handle);
        rx
    }
}

/// Collects every event currently queued on a receiver.
pub(crate) fn drain(rx: &mut mpsc::Receiver<LiveEvent>) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
