use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::SettingRow;

/// Reserved settings key holding the base64 key-encryption key.
pub const SETTING_KEK: &str = "setting_kek";

/// Reserved settings key holding the base64 sealed data-encryption key.
pub const SETTING_DEK: &str = "setting_dek";

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn save_setting(&self, key: &str, value: &str) -> DatabaseResult<Uuid>;

    /// Return the most recently inserted row for `key`, if any.
    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SettingRow>>;

    /// Persist a KEK/DEK pair as one transaction: both rows are written
    /// at the next version, or neither is.
    async fn save_keys(&self, kek_b64: &str, dek_b64: &str) -> DatabaseResult<()>;
}

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn save_setting(&self, key: &str, value: &str) -> DatabaseResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SettingRow>> {
        let row = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT key, value, version, created_at
            FROM settings
            WHERE key = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn save_keys(&self, kek_b64: &str, dek_b64: &str) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT version
            FROM settings
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;
        let version = current.map_or(1, |v| v + 1);

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, version)
            VALUES ($1, $2, $5), ($3, $4, $5)
            "#,
        )
        .bind(SETTING_KEK)
        .bind(kek_b64)
        .bind(SETTING_DEK)
        .bind(dek_b64)
        .bind(version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
