use std::sync::Arc;

use auth_identity::hash_password;
use database_layer::{DatabaseError, UserStore};
use tracing::info;
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};

/// User registration over the user store.
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> ServerResult<Uuid> {
        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err(ServerError::InvalidArgument(
                "please provide username, email and password".into(),
            ));
        }

        let password_hash =
            hash_password(password).map_err(|err| ServerError::Internal(err.to_string()))?;

        match self.users.save_user(username, &password_hash, email).await {
            Ok(id) => {
                info!(username, "user created");
                Ok(id)
            }
            Err(DatabaseError::UniqueViolation(_)) => {
                Err(ServerError::AlreadyExists("user already exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database_layer::memory::MemoryUserStore;

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let store = Arc::new(MemoryUserStore::new());
        let service = UserService::new(store.clone());

        service.create_user("alice", "pw", "a@x").await.unwrap();

        let user = store.find_by_username("alice").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "pw");
        assert!(auth_identity::verify_password("pw", &user.password_hash));
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let service = UserService::new(Arc::new(MemoryUserStore::new()));

        for (username, password, email) in [("", "pw", "a@x"), ("a", "", "a@x"), ("a", "pw", "")] {
            let err = service
                .create_user(username, password, email)
                .await
                .unwrap_err();
            assert!(matches!(err, ServerError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let service = UserService::new(Arc::new(MemoryUserStore::new()));

        service.create_user("bob", "pw", "b@x").await.unwrap();
        let err = service.create_user("bob", "pw2", "b2@x").await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyExists(_)));
    }
}
