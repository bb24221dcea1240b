use crate::api::MgmtState;
use crate::api::schemas::health::{ComponentStatus, ReadinessResponse};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

fn component_status(component: &'static str, result: Result<(), String>) -> ComponentStatus {
    match result {
        Ok(()) => ComponentStatus::Ok,
        Err(e) => {
            tracing::warn!(error = %e, component, "Dependency not ready");
            ComponentStatus::Error
        }
    }
}

/// Ready once both the message store and the image bucket answer within their timeouts.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let health = &state.health_service;
    let (db, images) = tokio::join!(health.check_db(), health.check_storage());

    let response = ReadinessResponse::new(component_status("database", db), component_status("image_storage", images));
    let status_code = if response.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (status_code, Json(response))
}
