#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::database::{DbPool, MessageRepository, MessageStore, UserDirectory, UserRepository};
use crate::adapters::storage::ImageStore;
use crate::api::ServiceContainer;
use crate::config::{Config, StorageConfig};
use crate::services::delivery::DeliveryRouter;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::presence::PresenceRegistry;
use crate::services::read_state::ReadStateTracker;
use crate::services::retraction::RetractionHandler;
use std::sync::Arc;
use tokio::sync::watch;

/// Fully wired services, ready to be mounted on routers.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

/// Assembles the service graph from its adapters.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    messages: Option<Arc<dyn MessageStore>>,
    users: Option<Arc<dyn UserDirectory>>,
    images: Option<Arc<dyn ImageStore>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, messages: None, users: None, images: None }
    }

    /// Backs messages and users with Postgres.
    #[must_use]
    pub fn with_database(self, pool: DbPool) -> Self {
        self.with_stores(Arc::new(MessageRepository::new(pool.clone())), Arc::new(UserRepository::new(pool)))
    }

    #[must_use]
    pub fn with_stores(mut self, messages: Arc<dyn MessageStore>, users: Arc<dyn UserDirectory>) -> Self {
        self.messages = Some(messages);
        self.users = Some(users);
        self
    }

    #[must_use]
    pub fn with_image_store(mut self, images: Arc<dyn ImageStore>) -> Self {
        self.images = Some(images);
        self
    }

    /// # Errors
    /// Returns an error if a required adapter was not supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let messages = self.messages.ok_or_else(|| anyhow::anyhow!("Message store is required"))?;
        let users = self.users.ok_or_else(|| anyhow::anyhow!("User directory is required"))?;
        let images = self.images.ok_or_else(|| anyhow::anyhow!("Image store is required"))?;
        let config = self.config;

        let presence = PresenceRegistry::new();
        let router = DeliveryRouter::new(presence.clone());

        let message_service = MessageService::new(
            Arc::clone(&messages),
            users,
            Arc::clone(&images),
            router.clone(),
            config.messaging.clone(),
        );
        let read_state = ReadStateTracker::new(Arc::clone(&messages), router.clone());
        let retraction = RetractionHandler::new(Arc::clone(&messages), router.clone(), &config.messaging);
        let gateway_service = GatewayService::new(presence, router, config.websocket.clone());
        let health_service = HealthService::new(messages, images, config.health.clone());

        Ok(App {
            services: ServiceContainer { message_service, read_state, retraction, gateway_service },
            health_service,
        })
    }
}

/// Applies pending schema migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Flips the shutdown flag on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, starting graceful shutdown");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach structured logs.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        let location = info.location().map(ToString::to_string).unwrap_or_default();

        tracing::error!(panic.payload = %payload, panic.location = %location, "Thread panicked");
    }));
}

/// Builds an S3 client from the storage configuration.
pub async fn initialize_s3_client(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(aws_credential_types::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style).build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
