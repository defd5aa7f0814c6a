use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("token secret must not be empty")]
    EmptySecret,

    #[error("hashing error")]
    HashingError,

    #[error("could not generate token")]
    TokenGeneration,

    #[error("database error: {0}")]
    Database(#[from] database_layer::DatabaseError),
}

pub type AuthResult<T> = Result<T, AuthError>;
