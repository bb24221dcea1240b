use crate::config::WsConfig;
use crate::domain::event::LiveEvent;
use crate::services::delivery::DeliveryRouter;
use crate::services::gateway::Metrics;
use crate::services::presence::{ConnectionHandle, PresenceRegistry};
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use uuid::Uuid;

pub(crate) struct Session {
    pub(crate) user_id: Uuid,
    pub(crate) request_id: String,
    pub(crate) socket: WebSocket,
    pub(crate) presence: PresenceRegistry,
    pub(crate) router: DeliveryRouter,
    pub(crate) metrics: Metrics,
    pub(crate) config: WsConfig,
    pub(crate) shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = %self.user_id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.session_id = tracing::field::Empty
        )
    )]
    pub(crate) async fn run(self) {
        let Self { user_id, socket, presence, router, metrics, config, mut shutdown_rx, .. } = self;

        let (handle, mut events_rx) = ConnectionHandle::channel(config.outbound_buffer_size);
        let session_id = handle.session_id();
        tracing::Span::current().record("ws.session_id", tracing::field::display(session_id));

        // Dropping the superseded handle closes the older session's event channel.
        if presence.register(user_id, handle).is_some() {
            tracing::info!("Superseded an existing connection for this user");
        }
        metrics.active_connections.add(1, &[]);
        tracing::info!("WebSocket connected");

        router.broadcast(&LiveEvent::OnlineUsers(presence.online_users()));

        let (mut ws_sink, mut ws_stream) = socket.split();

        let ping_period = Duration::from_secs(config.ping_interval_secs.max(1));
        let idle_limit = ping_period + Duration::from_secs(config.ping_timeout_secs);
        let mut heartbeat = interval_at(Instant::now() + ping_period, ping_period);
        let mut last_seen = Instant::now();

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        // Sender gone means the process is exiting.
                        let _ = ws_sink.send(WsMessage::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "Server shutting down".into(),
                        }))).await;
                        break;
                    }
                }

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                        Some(Ok(WsMessage::Text(t))) => {
                            last_seen = Instant::now();
                            tracing::debug!(len = t.len(), "Ignoring client text frame");
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            last_seen = Instant::now();
                            tracing::debug!("Ignoring client binary frame");
                        }
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                            last_seen = Instant::now();
                        }
                    }
                }

                event = events_rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Connection replaced by a newer session");
                        metrics.replaced_total.add(1, &[]);
                        let _ = ws_sink.send(WsMessage::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "Connection replaced".into(),
                        }))).await;
                        break;
                    };

                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, event = event.name(), "Failed to encode live event"),
                    }
                }

                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > idle_limit {
                        tracing::info!("Heartbeat timed out");
                        metrics.heartbeat_timeouts_total.add(1, &[]);
                        break;
                    }
                    if ws_sink.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = ws_sink.close().await;

        // A replaced session must not evict its successor.
        if presence.release(user_id, session_id) {
            router.broadcast(&LiveEvent::OnlineUsers(presence.online_users()));
        }

        metrics.active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
}
