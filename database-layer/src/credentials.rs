use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{CredentialRow, DataType};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Append a credential row; the store assigns the next version in
    /// the `(user_id, name)` chain.
    async fn save(
        &self,
        user_id: Uuid,
        name: &str,
        data: &str,
        data_type: DataType,
    ) -> DatabaseResult<Uuid>;

    /// Newest row of the `(user_id, name)` chain, if any.
    async fn latest(&self, user_id: Uuid, name: &str) -> DatabaseResult<Option<CredentialRow>>;

    /// Full history for a user, newest versions first.
    async fn find_all(&self, user_id: Uuid) -> DatabaseResult<Vec<CredentialRow>>;
}

#[derive(Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn save(
        &self,
        user_id: Uuid,
        name: &str,
        data: &str,
        data_type: DataType,
    ) -> DatabaseResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO user_credentials (user_id, name, data, data_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(data)
        .bind(data_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn latest(&self, user_id: Uuid, name: &str) -> DatabaseResult<Option<CredentialRow>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT name, data, data_type, version, created_at
            FROM user_credentials
            WHERE user_id = $1 AND name = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_all(&self, user_id: Uuid) -> DatabaseResult<Vec<CredentialRow>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT name, data, data_type, version, created_at
            FROM user_credentials
            WHERE user_id = $1
            ORDER BY version DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
