use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer-token claims: the owning user and the expiry timestamp
/// (seconds since the epoch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64,
}
