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

use courier_server::adapters::storage::S3ImageStore;
use courier_server::api::MgmtState;
use courier_server::config::Config;
use courier_server::{AppBuilder, adapters, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    courier_server::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let pool = adapters::database::init_pool(&config.database).await?;
        courier_server::run_migrations(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        courier_server::spawn_signal_handler(shutdown_tx.clone());

        let s3_client = courier_server::initialize_s3_client(&config.storage).await;
        let image_store =
            S3ImageStore::new(s3_client, config.storage.bucket.clone(), config.storage.public_base_url());

        // Phase 2: Component Wiring (Pure logic, no side effects)
        let app = AppBuilder::new(config.clone()).with_database(pool).with_image_store(Arc::new(image_store)).build()?;

        // Phase 3: Runtime Setup (Listeners and Routers)
        let app_router = courier_server::api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_app = courier_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<
            (
                tokio::net::TcpListener,
                tokio::net::TcpListener,
                axum::Router,
                axum::Router,
                watch::Sender<bool>,
                watch::Receiver<bool>,
            ),
            anyhow::Error,
        >((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime
    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    let servers = async { tokio::try_join!(api_server, mgmt_server) };

    // Phase 5: Graceful Shutdown Orchestration
    let mut drain_rx = shutdown_rx.clone();
    tokio::select! {
        res = servers => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Server error");
            }
        }
        () = async {
            let _ = drain_rx.wait_for(|&s| s).await;
            tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)).await;
        } => {
            tracing::warn!("Timeout waiting for connections to drain");
        }
    }

    let _ = shutdown_tx.send(true);
    telemetry_guard.shutdown();
    Ok(())
}
