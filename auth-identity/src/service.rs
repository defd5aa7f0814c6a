use std::sync::Arc;

use database_layer::UserStore;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::password::verify_password;
use crate::tokens::TokenService;

/// Login flow: username lookup, bcrypt check, token mint.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<String> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash) {
            debug!(username, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens.mint(user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use database_layer::memory::MemoryUserStore;

    async fn service_with_user(username: &str, password: &str) -> (AuthService, TokenService) {
        let users = Arc::new(MemoryUserStore::new());
        let hashed = hash_password(password).unwrap();
        users.save_user(username, &hashed, "a@x").await.unwrap();

        let tokens = TokenService::new("test-secret").unwrap();
        (AuthService::new(users, tokens.clone()), tokens)
    }

    #[tokio::test]
    async fn test_login_mints_verifiable_token() {
        let (auth, tokens) = service_with_user("alice", "pw").await;

        let token = auth.login("alice", "pw").await.unwrap();
        tokens.verify(&token).unwrap();
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let (auth, _) = service_with_user("alice", "pw").await;

        let err = auth.login("mallory", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (auth, _) = service_with_user("alice", "pw").await;

        let err = auth.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
