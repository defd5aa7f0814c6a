//! Envelope-encryption engine.
//!
//! Holds the key-encryption key in plaintext and the data-encryption
//! key sealed under it. Every public operation unseals the DEK, uses
//! it, and drops it; the DEK plaintext never outlives a single call.
//! One lock serializes encrypt, decrypt and the rotation step so every
//! caller observes a coherent (KEK, sealed-DEK) pair. The critical
//! sections are pure CPU; persistence happens outside the lock.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use crypto::{generate_key, seal_key, unseal_key, DataCipher, KEY_LEN};
use database_layer::{SettingsStore, SETTING_DEK, SETTING_KEK};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};
use zeroize::Zeroizing;

use crate::error::{ServerError, ServerResult};

struct KeyPair {
    kek: Zeroizing<[u8; KEY_LEN]>,
    sealed_dek: Vec<u8>,
}

pub struct SecureService {
    settings: Arc<dyn SettingsStore>,
    keys: Mutex<KeyPair>,
}

impl SecureService {
    /// Load the key pair from the settings store, or generate and
    /// persist a fresh one when either row is missing.
    ///
    /// The DEK is always persisted in its sealed form, so a restart
    /// reloads exactly what lives in memory.
    pub async fn init(settings: Arc<dyn SettingsStore>) -> ServerResult<Self> {
        let kek_row = settings.find_by_key(SETTING_KEK).await?;
        let dek_row = settings.find_by_key(SETTING_DEK).await?;

        let pair = match (kek_row, dek_row) {
            (Some(kek_row), Some(dek_row)) => {
                let kek = decode_kek(&kek_row.value)?;
                let sealed_dek = BASE64
                    .decode(&dek_row.value)
                    .map_err(|_| ServerError::Internal("stored DEK is not valid base64".into()))?;
                info!("kek and dek loaded");
                KeyPair { kek, sealed_dek }
            }
            _ => {
                let kek = Zeroizing::new(generate_key());
                let dek = Zeroizing::new(generate_key());
                let sealed_dek = seal_key(&kek, dek.as_slice())?;

                settings
                    .save_keys(&BASE64.encode(kek.as_slice()), &BASE64.encode(&sealed_dek))
                    .await?;
                info!("generated fresh kek and dek");
                KeyPair { kek, sealed_dek }
            }
        };

        Ok(Self {
            settings,
            keys: Mutex::new(pair),
        })
    }

    /// Seal a payload under the DEK. Returns base64 ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> ServerResult<String> {
        let keys = self.keys.lock();
        let dek = unseal_key(&keys.kek, &keys.sealed_dek)?;
        let cipher = DataCipher::new(&dek)?;
        Ok(cipher.encrypt(plaintext)?)
    }

    /// Open a payload produced by [`SecureService::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> ServerResult<Vec<u8>> {
        let keys = self.keys.lock();
        let dek = unseal_key(&keys.kek, &keys.sealed_dek)?;
        let cipher = DataCipher::new(&dek)?;
        Ok(cipher.decrypt(encoded)?)
    }

    /// One rotation step: re-seal the DEK under a freshly generated
    /// KEK, persist the new pair, then swap it in.
    ///
    /// The DEK plaintext is unchanged, so every previously encrypted
    /// payload stays readable. If persistence fails the in-memory pair
    /// is left untouched and the next tick retries.
    pub async fn rotate_keys(&self) -> ServerResult<()> {
        let (new_kek, new_sealed_dek) = {
            let keys = self.keys.lock();
            let dek = unseal_key(&keys.kek, &keys.sealed_dek)?;
            let new_kek = Zeroizing::new(generate_key());
            let new_sealed_dek = seal_key(&new_kek, &dek)?;
            (new_kek, new_sealed_dek)
        };

        self.settings
            .save_keys(
                &BASE64.encode(new_kek.as_slice()),
                &BASE64.encode(&new_sealed_dek),
            )
            .await?;

        let mut keys = self.keys.lock();
        keys.kek = new_kek;
        keys.sealed_dek = new_sealed_dek;
        Ok(())
    }

    /// Rotation loop: rotate every `interval` until shutdown.
    pub async fn run_rotation(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the first
        // rotation happens one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.rotate_keys().await {
                        Ok(()) => info!("keys rotated"),
                        Err(err) => error!(error = %err, "key rotation failed, keeping previous keys"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("rotation loop stopped");
                    break;
                }
            }
        }
    }
}

fn decode_kek(value: &str) -> ServerResult<Zeroizing<[u8; KEY_LEN]>> {
    let raw = BASE64
        .decode(value)
        .map_err(|_| ServerError::Internal("stored KEK is not valid base64".into()))?;
    let kek: [u8; KEY_LEN] = raw
        .as_slice()
        .try_into()
        .map_err(|_| ServerError::Internal("stored KEK has wrong length".into()))?;
    Ok(Zeroizing::new(kek))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use database_layer::memory::MemorySettingsStore;
    use database_layer::{DatabaseResult, SettingRow};

    async fn fresh_service() -> (Arc<MemorySettingsStore>, SecureService) {
        let store = Arc::new(MemorySettingsStore::new());
        let service = SecureService::init(store.clone()).await.unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn test_init_persists_sealed_pair() {
        let (store, _service) = fresh_service().await;

        let kek_row = store.find_by_key(SETTING_KEK).await.unwrap().unwrap();
        let dek_row = store.find_by_key(SETTING_DEK).await.unwrap().unwrap();

        let kek = BASE64.decode(&kek_row.value).unwrap();
        let sealed_dek = BASE64.decode(&dek_row.value).unwrap();
        assert_eq!(kek.len(), KEY_LEN);
        // Sealed form: 16-byte IV prefix plus 32 bytes of key material.
        assert_eq!(sealed_dek.len(), crypto::SEAL_IV_LEN + KEY_LEN);
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let (_store, service) = fresh_service().await;

        let sealed = service.encrypt(b"my secret").unwrap();
        assert_eq!(service.decrypt(&sealed).unwrap(), b"my secret");
    }

    #[tokio::test]
    async fn test_roundtrip_across_rotation() {
        let (_store, service) = fresh_service().await;

        let sealed = service.encrypt(b"pre-rotation payload").unwrap();
        service.rotate_keys().await.unwrap();
        assert_eq!(service.decrypt(&sealed).unwrap(), b"pre-rotation payload");
    }

    #[tokio::test]
    async fn test_many_rotations_preserve_readability() {
        let (_store, service) = fresh_service().await;

        let sealed = service.encrypt(b"durable").unwrap();
        for _ in 0..10 {
            service.rotate_keys().await.unwrap();
        }
        assert_eq!(service.decrypt(&sealed).unwrap(), b"durable");
    }

    #[tokio::test]
    async fn test_restart_reloads_persisted_state() {
        let (store, service) = fresh_service().await;

        let sealed = service.encrypt(b"survives restart").unwrap();
        service.rotate_keys().await.unwrap();
        drop(service);

        let reloaded = SecureService::init(store).await.unwrap();
        assert_eq!(reloaded.decrypt(&sealed).unwrap(), b"survives restart");
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let (_store, service) = fresh_service().await;

        let sealed = service.encrypt(b"payload").unwrap();
        let mut raw = BASE64.decode(&sealed).unwrap();
        raw[crypto::NONCE_LEN] ^= 0x01;
        let tampered = BASE64.encode(raw);

        assert!(service.decrypt(&tampered).is_err());
    }

    #[tokio::test]
    async fn test_short_payload_rejected() {
        let (_store, service) = fresh_service().await;

        let short = BASE64.encode([0u8; crypto::NONCE_LEN - 1]);
        assert!(service.decrypt(&short).is_err());
    }

    /// Settings store whose writes fail after the first one, to model a
    /// database outage during rotation.
    struct FlakySettingsStore {
        inner: MemorySettingsStore,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SettingsStore for FlakySettingsStore {
        async fn save_setting(&self, key: &str, value: &str) -> DatabaseResult<uuid::Uuid> {
            self.inner.save_setting(key, value).await
        }

        async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SettingRow>> {
            self.inner.find_by_key(key).await
        }

        async fn save_keys(&self, kek_b64: &str, dek_b64: &str) -> DatabaseResult<()> {
            if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(database_layer::DatabaseError::Sqlx(
                    sqlx::Error::PoolClosed,
                ));
            }
            self.inner.save_keys(kek_b64, dek_b64).await
        }
    }

    #[tokio::test]
    async fn test_failed_rotation_keeps_state_usable() {
        let store = Arc::new(FlakySettingsStore {
            inner: MemorySettingsStore::new(),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        });
        let service = SecureService::init(store.clone()).await.unwrap();
        let sealed = service.encrypt(b"still here").unwrap();

        store
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(service.rotate_keys().await.is_err());

        // The previous pair is still in place on both paths.
        assert_eq!(service.decrypt(&sealed).unwrap(), b"still here");
        let sealed_after = service.encrypt(b"new write").unwrap();
        assert_eq!(service.decrypt(&sealed_after).unwrap(), b"new write");
    }
}
