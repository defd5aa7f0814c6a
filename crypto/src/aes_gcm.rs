use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::KEY_LEN;

/// AES-GCM nonce length in bytes (96 bits, recommended for GCM).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher over a data-encryption key.
///
/// Output format is `base64(nonce || ciphertext || tag)`; the nonce is
/// drawn fresh from the OS RNG for every seal.
pub struct DataCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for DataCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCipher").finish_non_exhaustive()
    }
}

impl DataCipher {
    /// Build a cipher from raw key material. The key must be 32 bytes.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                got: key.len(),
            });
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        })?;
        Ok(Self { cipher })
    }

    /// Seal a payload and return it base64-armored.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Open a payload produced by [`DataCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> CryptoResult<Vec<u8>> {
        let sealed = BASE64
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidEncoding)?;
        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }
        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, body)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}
