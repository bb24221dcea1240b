use crate::adapters::database::records::UserRecord;
use crate::adapters::database::{DbPool, UserDirectory};
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn exists(&self, user_id: Uuid) -> Result<bool> {
        let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_except(&self, user_id: Uuid) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, full_name, profile_pic, created_at
            FROM users
            WHERE id <> $1
            ORDER BY username ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
