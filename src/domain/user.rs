use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user as listed in the contacts sidebar. Accounts are owned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub profile_pic: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn new(username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            full_name: full_name.into(),
            profile_pic: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
