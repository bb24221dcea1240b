use crate::adapters::database::MessageStore;
use crate::adapters::storage::ImageStore;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            status: meter
                .i64_gauge("courier_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }

    fn record(&self, component: &'static str, ok: bool) {
        self.status.record(i64::from(ok), &[KeyValue::new("component", component)]);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn MessageStore>,
    images: Arc<dyn ImageStore>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, images: Arc<dyn ImageStore>, config: HealthConfig) -> Self {
        Self { store, images, config, metrics: Metrics::new() }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        let result = match timeout(db_timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e}")),
            Err(_) => Err("Database connection timed out".to_string()),
        };
        self.metrics.record("database", result.is_ok());
        result
    }

    /// Checks object storage connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if storage is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);

        let result = match timeout(storage_timeout, self.images.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Storage connection failed: {e}")),
            Err(_) => Err("Storage connection timed out".to_string()),
        };
        self.metrics.record("storage", result.is_ok());
        result
    }
}
