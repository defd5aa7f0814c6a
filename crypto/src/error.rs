use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("sealed key too short")]
    SealedKeyTooShort,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("invalid base64 encoding")]
    InvalidEncoding,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
