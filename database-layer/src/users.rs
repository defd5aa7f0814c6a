use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::UserRecord;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user and return its id. A duplicate username
    /// surfaces as [`DatabaseError::UniqueViolation`](crate::DatabaseError::UniqueViolation).
    async fn save_user(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> DatabaseResult<Uuid>;

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn save_user(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> DatabaseResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (username, password_hash, email)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
