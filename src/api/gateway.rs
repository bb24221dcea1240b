use crate::api::AppState;
use crate::domain::auth::Claims;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http::{Extensions, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_http::request_id::RequestId;

#[derive(Deserialize)]
pub struct WsParams {
    token: String,
}

impl std::fmt::Debug for WsParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsParams").field("token", &"<redacted>").finish()
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    extensions: Extensions,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = extensions
        .get::<RequestId>()
        .map(|id| id.header_value().to_str().unwrap_or_default().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match Claims::decode(&params.token, &state.config.auth.jwt_secret) {
        Ok(claims) => {
            let gateway = state.gateway_service.clone();
            let shutdown_rx = state.shutdown_rx.clone();
            ws.on_upgrade(move |socket| async move {
                gateway.handle_socket(socket, claims.sub, request_id, shutdown_rx).await;
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
