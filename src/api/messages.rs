use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messaging::{DeleteMessageResponse, MarkReadRequest, MarkReadResponse, SendMessageRequest};
use crate::domain::message::{Message, UnreadCounts};
use crate::domain::user::User;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Lists every other user for the contact sidebar.
///
/// # Errors
/// Returns `AppError::Database` if the lookup fails.
pub async fn list_contacts(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let users = state.message_service.list_contacts(auth_user.user_id).await?;
    Ok(Json(users))
}

/// Unread counts keyed by sender, for the caller as receiver.
///
/// # Errors
/// Returns `AppError::Database` if the aggregate query fails.
pub async fn unread_counts(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<UnreadCounts>> {
    let counts = state.read_state.unread_counts(auth_user.user_id).await?;
    Ok(Json(counts))
}

/// Marks the conversation with `senderId` as read by the caller.
///
/// # Errors
/// Returns `AppError::Database` if the update fails.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>> {
    let updated = state.read_state.mark_conversation_read(auth_user.user_id, payload.sender_id).await?;
    Ok(Json(MarkReadResponse { message: "Messages marked as read".to_string(), updated }))
}

/// Full history between the caller and another user.
///
/// # Errors
/// Returns `AppError::Database` if the query fails.
pub async fn get_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(other_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    let messages = state.message_service.get_conversation(auth_user.user_id, other_id).await?;
    Ok(Json(messages))
}

/// Sends a message to `id`.
///
/// # Errors
/// Returns `AppError::BadRequest` if the message is empty or the image is invalid.
/// Returns `AppError::NotFound` if the receiver does not exist.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message =
        state.message_service.send_message(auth_user.user_id, receiver_id, payload.text, payload.image).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Retracts one of the caller's own recent messages.
///
/// # Errors
/// Returns `AppError::NotFound` if the message does not exist.
/// Returns `AppError::Forbidden` if it is too old or was sent by someone else.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<DeleteMessageResponse>> {
    state.retraction.delete_message(auth_user.user_id, message_id).await?;
    Ok(Json(DeleteMessageResponse { message: "Message deleted successfully".to_string() }))
}
