use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AuthError, AuthResult};

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> AuthResult<String> {
    hash(password, DEFAULT_COST).map_err(|_| AuthError::HashingError)
}

/// Check a password against a stored bcrypt hash. Any parse or
/// verification failure counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}
