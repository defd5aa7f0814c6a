//! Cryptographic primitives for Strongbox.
//!
//! Two layers, matching the envelope-encryption scheme:
//!
//! - [`keys`]: 256-bit key generation plus sealing/unsealing of the
//!   data-encryption key under the key-encryption key (AES-CFB with an
//!   IV prefix).
//! - [`aes_gcm`]: authenticated payload encryption under the DEK
//!   (AES-256-GCM, `base64(nonce || ciphertext || tag)`).

pub mod aes_gcm;
pub mod error;
pub mod keys;

pub use aes_gcm::{DataCipher, NONCE_LEN};
pub use error::{CryptoError, CryptoResult};
pub use keys::{generate_key, seal_key, unseal_key, KEY_LEN, SEAL_IV_LEN};
