//! Postgres persistence for Strongbox.
//!
//! Three repository contracts (users, settings holding key material,
//! credential records), each as a trait with a sqlx implementation.
//! The settings and credential tables are append-only: reads return
//! the most recently inserted row for a key. In-memory implementations
//! of every contract live in [`memory`] for tests.

pub mod connection;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod models;
pub mod settings;
pub mod users;

pub use connection::connect;
pub use credentials::{CredentialRepository, CredentialStore};
pub use error::{DatabaseError, DatabaseResult};
pub use models::{CredentialRow, DataType, SettingRow, UserRecord};
pub use settings::{SettingsRepository, SettingsStore, SETTING_DEK, SETTING_KEK};
pub use users::{UserRepository, UserStore};
