//! In-memory store implementations.
//!
//! These back service-level tests and mirror the contracts of the SQL
//! repositories: unique usernames, append-only settings with a shared
//! version per key pair, and per-`(user_id, name)` credential version
//! chains.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{CredentialRow, DataType, SettingRow, UserRecord};
use crate::settings::{SettingsStore, SETTING_DEK, SETTING_KEK};
use crate::users::UserStore;
use crate::credentials::CredentialStore;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn save_user(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> DatabaseResult<Uuid> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.username == username) {
            return Err(DatabaseError::UniqueViolation(format!(
                "duplicate key value violates unique constraint \"users_username_key\" ({username})"
            )));
        }
        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: "user".to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = record.id;
        users.push(record);
        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        Ok(self.users.lock().iter().find(|u| u.email == email).cloned())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    rows: Mutex<Vec<SettingRow>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn save_setting(&self, key: &str, value: &str) -> DatabaseResult<Uuid> {
        self.rows.lock().push(SettingRow {
            key: key.to_string(),
            value: value.to_string(),
            version: 1,
            created_at: Utc::now(),
        });
        Ok(Uuid::new_v4())
    }

    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SettingRow>> {
        // Rows are appended in order, so the last match is the newest.
        Ok(self
            .rows
            .lock()
            .iter()
            .rev()
            .find(|row| row.key == key)
            .cloned())
    }

    async fn save_keys(&self, kek_b64: &str, dek_b64: &str) -> DatabaseResult<()> {
        let mut rows = self.rows.lock();
        let version = rows.last().map_or(1, |row| row.version + 1);
        let now = Utc::now();
        rows.push(SettingRow {
            key: SETTING_KEK.to_string(),
            value: kek_b64.to_string(),
            version,
            created_at: now,
        });
        rows.push(SettingRow {
            key: SETTING_DEK.to_string(),
            value: dek_b64.to_string(),
            version,
            created_at: now,
        });
        Ok(())
    }
}

struct StoredCredential {
    user_id: Uuid,
    row: CredentialRow,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: Mutex<Vec<StoredCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(
        &self,
        user_id: Uuid,
        name: &str,
        data: &str,
        data_type: DataType,
    ) -> DatabaseResult<Uuid> {
        let mut rows = self.rows.lock();
        let version = rows
            .iter()
            .filter(|c| c.user_id == user_id && c.row.name == name)
            .map(|c| c.row.version)
            .max()
            .unwrap_or(0)
            + 1;
        rows.push(StoredCredential {
            user_id,
            row: CredentialRow {
                name: name.to_string(),
                data: data.to_string(),
                data_type,
                version,
                created_at: Utc::now(),
            },
        });
        Ok(Uuid::new_v4())
    }

    async fn latest(&self, user_id: Uuid, name: &str) -> DatabaseResult<Option<CredentialRow>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .rev()
            .find(|c| c.user_id == user_id && c.row.name == name)
            .map(|c| c.row.clone()))
    }

    async fn find_all(&self, user_id: Uuid) -> DatabaseResult<Vec<CredentialRow>> {
        let mut result: Vec<CredentialRow> = self
            .rows
            .lock()
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.row.clone())
            .collect();
        result.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let store = MemoryUserStore::new();
        store.save_user("bob", "hash", "b@x").await.unwrap();

        let err = store.save_user("bob", "hash2", "b2@x").await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_save_keys_bumps_shared_version() {
        let store = MemorySettingsStore::new();
        store.save_keys("kek-1", "dek-1").await.unwrap();
        store.save_keys("kek-2", "dek-2").await.unwrap();

        let kek = store.find_by_key(SETTING_KEK).await.unwrap().unwrap();
        let dek = store.find_by_key(SETTING_DEK).await.unwrap().unwrap();
        assert_eq!(kek.value, "kek-2");
        assert_eq!(dek.value, "dek-2");
        assert_eq!(kek.version, 2);
        assert_eq!(dek.version, 2);
    }

    #[tokio::test]
    async fn test_credential_version_chain() {
        let store = MemoryCredentialStore::new();
        let user = Uuid::new_v4();

        store
            .save(user, "gmail", "first", DataType::Credentials)
            .await
            .unwrap();
        store
            .save(user, "gmail", "second", DataType::Credentials)
            .await
            .unwrap();
        store
            .save(user, "bank", "card", DataType::CreditCard)
            .await
            .unwrap();

        let latest = store.latest(user, "gmail").await.unwrap().unwrap();
        assert_eq!(latest.data, "second");
        assert_eq!(latest.version, 2);

        let all = store.find_all(user).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].version >= w[1].version));
    }

    #[tokio::test]
    async fn test_find_all_is_scoped_to_user() {
        let store = MemoryCredentialStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .save(alice, "gmail", "a", DataType::Credentials)
            .await
            .unwrap();
        store
            .save(bob, "gmail", "b", DataType::Credentials)
            .await
            .unwrap();

        let rows = store.find_all(alice).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data, "a");
    }
}
