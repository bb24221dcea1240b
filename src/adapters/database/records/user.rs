use crate::domain::user::User;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub profile_pic: String,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            full_name: record.full_name,
            profile_pic: record.profile_pic,
            created_at: record.created_at,
        }
    }
}
