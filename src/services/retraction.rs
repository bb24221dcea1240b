use crate::adapters::database::MessageStore;
use crate::config::MessagingConfig;
use crate::domain::event::LiveEvent;
use crate::domain::message::DeletedNotice;
use crate::error::{AppError, ForbiddenReason, Result};
use crate::services::delivery::DeliveryRouter;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    retractions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            retractions_total: meter
                .u64_counter("message_retractions_total")
                .with_description("Message deletion attempts by outcome")
                .build(),
        }
    }

    fn record(&self, outcome: &'static str) {
        self.retractions_total.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

/// Lets a sender permanently delete a message within a fixed window after sending it.
#[derive(Clone, Debug)]
pub struct RetractionHandler {
    store: Arc<dyn MessageStore>,
    router: DeliveryRouter,
    window: Duration,
    metrics: Metrics,
}

impl RetractionHandler {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, router: DeliveryRouter, config: &MessagingConfig) -> Self {
        Self { store, router, window: Duration::seconds(config.retraction_window_secs), metrics: Metrics::new() }
    }

    /// Deletes a message on behalf of its sender.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if it is older than the window or not sent by `requester_id`.
    pub async fn delete_message(&self, requester_id: Uuid, message_id: Uuid) -> Result<()> {
        self.delete_message_at(requester_id, message_id, OffsetDateTime::now_utc()).await
    }

    /// Same as [`Self::delete_message`], evaluating the window at `now`.
    ///
    /// The age check runs before the ownership check, so a stranger asking to delete an
    /// expired message is told it is too old rather than that it is not theirs.
    ///
    /// # Errors
    /// See [`Self::delete_message`].
    #[tracing::instrument(err(level = "warn"), skip(self, now))]
    pub async fn delete_message_at(&self, requester_id: Uuid, message_id: Uuid, now: OffsetDateTime) -> Result<()> {
        let Some(message) = self.store.find_by_id(message_id).await? else {
            self.metrics.record("not_found");
            return Err(AppError::NotFound);
        };

        if !message.is_retractable_at(now, self.window) {
            self.metrics.record("too_old");
            return Err(AppError::Forbidden(ForbiddenReason::TooOld));
        }

        if message.sender_id != requester_id {
            self.metrics.record("not_owner");
            return Err(AppError::Forbidden(ForbiddenReason::NotOwner));
        }

        if !self.store.delete(message_id).await? {
            // Lost a race with a concurrent retraction of the same message.
            self.metrics.record("not_found");
            return Err(AppError::NotFound);
        }

        self.metrics.record("deleted");
        tracing::info!("Message retracted");

        self.router.push(message.receiver_id, LiveEvent::MessageDeleted(DeletedNotice { message_id }));
        Ok(())
    }
}
