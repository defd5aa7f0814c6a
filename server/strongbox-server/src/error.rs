use auth_identity::AuthError;
use crypto::CryptoError;
use database_layer::DatabaseError;
use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AuthError> for ServerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound
            | AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken => ServerError::Unauthenticated(err.to_string()),
            AuthError::TokenGeneration => ServerError::Internal("Could not generate token".into()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unauthenticated(msg) => Status::unauthenticated(msg),
            ServerError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ServerError::AlreadyExists(msg) => Status::already_exists(msg),
            // Store, crypto and I/O failures all collapse to Internal at
            // the RPC edge; details go to the log, not the client.
            other => Status::internal(other.to_string()),
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
