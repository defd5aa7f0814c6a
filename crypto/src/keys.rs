//! Key generation and key wrapping.
//!
//! The data-encryption key (DEK) is kept sealed under the key-encryption
//! key (KEK) whenever it is at rest or idle in memory. Sealing uses
//! AES-256 in CFB mode with a random 16-byte IV prepended to the
//! ciphertext, so a sealed key is `iv || AES-CFB(dek)`.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use aes::Aes256;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

/// Length of KEK and DEK material in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the IV prefix on a sealed key (AES block size).
pub const SEAL_IV_LEN: usize = 16;

/// Generate a fresh 256-bit key from the OS RNG.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Seal a key under the KEK. Returns `iv || ciphertext`.
pub fn seal_key(kek: &[u8; KEY_LEN], key: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut sealed = vec![0u8; SEAL_IV_LEN + key.len()];
    let (iv, body) = sealed.split_at_mut(SEAL_IV_LEN);
    rand::rngs::OsRng.fill_bytes(iv);
    body.copy_from_slice(key);

    let iv: [u8; SEAL_IV_LEN] = iv.try_into().map_err(|_| CryptoError::EncryptionFailed)?;
    Aes256CfbEnc::new(kek.into(), &iv.into()).encrypt(body);
    Ok(sealed)
}

/// Unseal a key previously produced by [`seal_key`].
///
/// The result is wrapped in [`Zeroizing`] so the plaintext key is wiped
/// when the caller drops it.
pub fn unseal_key(kek: &[u8; KEY_LEN], sealed: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if sealed.len() <= SEAL_IV_LEN {
        return Err(CryptoError::SealedKeyTooShort);
    }
    let (iv, body) = sealed.split_at(SEAL_IV_LEN);
    let iv: [u8; SEAL_IV_LEN] = iv.try_into().map_err(|_| CryptoError::SealedKeyTooShort)?;

    let mut key = Zeroizing::new(body.to_vec());
    Aes256CfbDec::new(kek.into(), &iv.into()).decrypt(&mut key);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
        assert_eq!(a.len(), KEY_LEN);
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let kek = generate_key();
        let dek = generate_key();

        let sealed = seal_key(&kek, &dek).unwrap();
        assert_eq!(sealed.len(), SEAL_IV_LEN + KEY_LEN);
        assert_ne!(&sealed[SEAL_IV_LEN..], dek.as_slice());

        let unsealed = unseal_key(&kek, &sealed).unwrap();
        assert_eq!(unsealed.as_slice(), dek.as_slice());
    }

    #[test]
    fn test_seal_uses_fresh_iv() {
        let kek = generate_key();
        let dek = generate_key();

        let sealed1 = seal_key(&kek, &dek).unwrap();
        let sealed2 = seal_key(&kek, &dek).unwrap();
        assert_ne!(sealed1, sealed2);
    }

    #[test]
    fn test_unseal_with_wrong_kek_garbles_key() {
        let kek = generate_key();
        let other = generate_key();
        let dek = generate_key();

        let sealed = seal_key(&kek, &dek).unwrap();
        let unsealed = unseal_key(&other, &sealed).unwrap();
        // CFB is unauthenticated, so unsealing succeeds but yields noise.
        assert_ne!(unsealed.as_slice(), dek.as_slice());
    }

    #[test]
    fn test_unseal_rejects_short_input() {
        let kek = generate_key();
        let err = unseal_key(&kek, &[0u8; SEAL_IV_LEN]).unwrap_err();
        assert!(matches!(err, CryptoError::SealedKeyTooShort));
    }
}
