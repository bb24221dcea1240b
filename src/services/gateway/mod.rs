pub(crate) mod session;

use crate::config::WsConfig;
use crate::services::delivery::DeliveryRouter;
use crate::services::gateway::session::Session;
use crate::services::presence::PresenceRegistry;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) replaced_total: Counter<u64>,
    pub(crate) heartbeat_timeouts_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            replaced_total: meter
                .u64_counter("websocket_replaced_total")
                .with_description("Connections closed because the same user connected again")
                .build(),
            heartbeat_timeouts_total: meter
                .u64_counter("websocket_heartbeat_timeouts_total")
                .with_description("Connections closed after missing heartbeats")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts authenticated sockets and binds them to the presence registry for their lifetime.
#[derive(Clone, Debug)]
pub struct GatewayService {
    presence: PresenceRegistry,
    router: DeliveryRouter,
    config: WsConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(presence: PresenceRegistry, router: DeliveryRouter, config: WsConfig) -> Self {
        Self { presence, router, config, metrics: Metrics::new() }
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        user_id: Uuid,
        request_id: String,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let session = Session {
            user_id,
            request_id,
            socket,
            presence: self.presence.clone(),
            router: self.router.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }
}
