use crate::adapters::database::{MessageStore, UserDirectory};
use crate::adapters::storage::{ImageStore, ImageUpload};
use crate::config::MessagingConfig;
use crate::domain::message::{Conversation, Message, NewMessage};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::delivery::DeliveryRouter;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            sent_total: meter
                .u64_counter("messages_sent_total")
                .with_description("Total messages persisted, by whether they were pushed live")
                .build(),
        }
    }
}

/// Send and fetch orchestration for direct messages.
#[derive(Clone, Debug)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    images: Arc<dyn ImageStore>,
    router: DeliveryRouter,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        store: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        images: Arc<dyn ImageStore>,
        router: DeliveryRouter,
        config: MessagingConfig,
    ) -> Self {
        Self { store, users, images, router, config, metrics: Metrics::new() }
    }

    /// Persists a message and pushes it to the receiver if they are connected.
    ///
    /// The message is durable before any push is attempted, so a receiver that misses the
    /// live event still finds it in history and in its unread counts.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the message carries neither text nor an image, or the
    /// image is malformed or too large.
    /// Returns `AppError::NotFound` if either participant does not exist. The receiver is
    /// checked before any upload, and an uploaded image is removed if the insert fails.
    /// Returns `AppError::Storage` if the image upload fails.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, text, image),
        fields(message_id = tracing::field::Empty, has_image = image.is_some())
    )]
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: Option<String>,
        image: Option<String>,
    ) -> Result<Message> {
        let text = text.filter(|t| !t.trim().is_empty());
        let image = image.filter(|i| !i.trim().is_empty());
        if text.is_none() && image.is_none() {
            return Err(AppError::BadRequest("Message must contain text or an image".into()));
        }

        if !self.users.exists(receiver_id).await? {
            return Err(AppError::NotFound);
        }

        let image_url = match image {
            Some(payload) => Some(self.upload_image(&payload).await?),
            None => None,
        };

        let created = self.store.create(NewMessage { sender_id, receiver_id, text, image: image_url.clone() }).await;
        let message = match created {
            Ok(message) => message,
            Err(e) => {
                if let Some(url) = image_url {
                    self.discard_image(&url).await;
                }
                return Err(e);
            }
        };
        tracing::Span::current().record("message_id", tracing::field::display(message.id));

        let delivered = self.router.deliver(&message);
        self.metrics.sent_total.add(1, &[KeyValue::new("delivered", delivered)]);

        Ok(message)
    }

    async fn upload_image(&self, payload: &str) -> Result<String> {
        let upload = ImageUpload::from_data_url(payload)?;
        if upload.bytes.len() > self.config.max_image_bytes {
            return Err(AppError::BadRequest(format!(
                "Image exceeds the maximum size of {} bytes",
                self.config.max_image_bytes
            )));
        }
        self.images.put_image(upload).await
    }

    async fn discard_image(&self, url: &str) {
        if let Err(e) = self.images.delete_image(url).await {
            tracing::warn!(error = %e, image_url = %url, "Failed to remove image of unsaved message");
        }
    }

    /// Full history between two users, oldest first. Symmetric in its arguments.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<Message>> {
        self.store.find_conversation(Conversation::between(user_a, user_b)).await
    }

    /// Every user except the requester, for the contact sidebar.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list_contacts(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.users.list_except(user_id).await
    }
}
