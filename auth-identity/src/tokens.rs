use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};

/// Bearer-token lifetime.
pub const TOKEN_TTL_HOURS: i64 = 3;

/// Mints and verifies HS256 bearer tokens.
///
/// The signing secret is injected at construction; an empty secret is
/// rejected so a misconfigured deployment fails at startup rather than
/// issuing forgeable tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Issue a token for `user_id`, expiring in [`TOKEN_TTL_HOURS`].
    pub fn mint(&self, user_id: Uuid) -> AuthResult<String> {
        let claims = Claims {
            user_id,
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGeneration)
    }

    /// Validate a token and return the user id it was issued for.
    ///
    /// An expired token is reported as [`AuthError::TokenExpired`];
    /// every other failure collapses to [`AuthError::InvalidToken`].
    pub fn verify(&self, token: &str) -> AuthResult<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;
        Ok(data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_verify_roundtrip() {
        let tokens = TokenService::new("test-secret").unwrap();
        let user_id = Uuid::new_v4();

        let token = tokens.mint(user_id).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn test_expired_token_is_reported() {
        let tokens = TokenService::new("test-secret").unwrap();
        let claims = Claims {
            user_id: Uuid::new_v4(),
            exp: (Utc::now() - Duration::seconds(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = tokens.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let minter = TokenService::new("secret-a").unwrap();
        let verifier = TokenService::new("secret-b").unwrap();

        let token = minter.mint(Uuid::new_v4()).unwrap();
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let tokens = TokenService::new("test-secret").unwrap();
        let err = tokens.verify("not.a.token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenService::new("").unwrap_err(),
            AuthError::EmptySecret
        ));
    }
}
