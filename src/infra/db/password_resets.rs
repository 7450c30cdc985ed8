use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreatePasswordResetParams, PasswordResetsRepo, RepoError},
    domain::entities::PasswordResetRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PasswordResetRow {
    token_hash: Vec<u8>,
    user_id: i64,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl From<PasswordResetRow> for PasswordResetRecord {
    fn from(row: PasswordResetRow) -> Self {
        Self {
            token_hash: row.token_hash,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl PasswordResetsRepo for PostgresRepositories {
    async fn create_reset(
        &self,
        params: CreatePasswordResetParams,
    ) -> Result<PasswordResetRecord, RepoError> {
        let row = sqlx::query_as::<_, PasswordResetRow>(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token_hash, user_id, created_at, expires_at
            "#,
        )
        .bind(params.token_hash)
        .bind(params.user_id)
        .bind(params.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_reset(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<PasswordResetRecord>, RepoError> {
        let row = sqlx::query_as::<_, PasswordResetRow>(
            r#"
            SELECT token_hash, user_id, created_at, expires_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(RepoError::from_persistence)?;

        Ok(row.map(PasswordResetRecord::from))
    }

    async fn delete_user_resets(&self, user_id: i64) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
