use crate::config::Config;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::read_state::ReadStateTracker;
use crate::services::retraction::RetractionHandler;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub message_service: MessageService,
    pub read_state: ReadStateTracker,
    pub retraction: RetractionHandler,
    pub gateway_service: GatewayService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub message_service: MessageService,
    pub read_state: ReadStateTracker,
    pub retraction: RetractionHandler,
    pub gateway_service: GatewayService,
}

/// Configures and returns the primary application router.
pub fn app_router(
    config: Config,
    services: ServiceContainer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    // Base64 inflates images by a third, plus the JSON envelope and text.
    let send_body_limit = config.messaging.max_image_bytes.saturating_mul(2).max(64 * 1024);

    let state = AppState {
        config,
        message_service: services.message_service,
        read_state: services.read_state,
        retraction: services.retraction,
        gateway_service: services.gateway_service,
        shutdown_rx,
    };

    let message_routes = Router::new()
        .route("/users", get(messages::list_contacts))
        .route("/unread-count", get(messages::unread_counts))
        .route("/mark-read", put(messages::mark_read))
        .route("/send/{id}", post(messages::send_message).layer(DefaultBodyLimit::max(send_body_limit)))
        .route("/{id}", get(messages::get_conversation))
        .route("/{id}", delete(messages::delete_message));

    let api_routes = Router::new().nest("/messages", message_routes).route("/gateway", get(gateway::websocket_handler));

    Router::new()
        .nest("/v1", api_routes)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(HeaderName::from_static("x-request-id"), MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
