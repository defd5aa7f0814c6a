use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Discriminant for the payload stored in a credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i32)]
pub enum DataType {
    CreditCard = 0,
    Credentials = 1,
}

#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub name: String,
    pub data: String,
    pub data_type: DataType,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}
