use crate::api::AppState;
use crate::domain::auth::Claims;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use uuid::Uuid;

const SESSION_COOKIE: &str = "jwt";

#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| session_cookie(&parts.headers))
            .ok_or(AppError::AuthError)?;

        let claims = Claims::decode(token, &state.config.auth.jwt_secret)?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        Ok(Self { user_id: claims.sub })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Browser clients authenticate with the session cookie set at login.
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
}
