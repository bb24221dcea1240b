use crate::error::{AppError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Claims of a session token issued by the identity service.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, ttl_secs: u64) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        Self { sub: user_id, exp: now + ttl_secs }
    }

    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes())).map_err(|_| AppError::Internal)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the token is malformed, expired or badly signed.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let token_data = decode::<Self>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map_err(|_| AppError::AuthError)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = Claims::new(user_id, 3600).encode("secret").unwrap();
        let claims = Claims::decode(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = Claims::new(Uuid::new_v4(), 3600).encode("secret").unwrap();
        assert!(matches!(Claims::decode(&token, "other"), Err(AppError::AuthError)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims { sub: Uuid::new_v4(), exp: 1 };
        let token = claims.encode("secret").unwrap();
        assert!(matches!(Claims::decode(&token, "secret"), Err(AppError::AuthError)));
    }
}
