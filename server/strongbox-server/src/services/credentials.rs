use std::sync::Arc;

use database_layer::{CredentialRow, CredentialStore, DataType};
use uuid::Uuid;

use crate::error::ServerResult;

/// Append-only credential records. The payload is opaque here;
/// encryption happens in the RPC façade before data reaches this
/// service.
pub struct CredentialService {
    creds: Arc<dyn CredentialStore>,
}

impl CredentialService {
    pub fn new(creds: Arc<dyn CredentialStore>) -> Self {
        Self { creds }
    }

    pub async fn save(
        &self,
        user_id: Uuid,
        name: &str,
        data: &str,
        data_type: DataType,
    ) -> ServerResult<Uuid> {
        Ok(self.creds.save(user_id, name, data, data_type).await?)
    }

    pub async fn get_latest(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> ServerResult<Option<CredentialRow>> {
        Ok(self.creds.latest(user_id, name).await?)
    }

    pub async fn get_all(&self, user_id: Uuid) -> ServerResult<Vec<CredentialRow>> {
        Ok(self.creds.find_all(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database_layer::memory::MemoryCredentialStore;

    #[tokio::test]
    async fn test_version_chain_reads() {
        let service = CredentialService::new(Arc::new(MemoryCredentialStore::new()));
        let user = Uuid::new_v4();

        service
            .save(user, "gmail", "v1", DataType::Credentials)
            .await
            .unwrap();
        service
            .save(user, "gmail", "v2", DataType::Credentials)
            .await
            .unwrap();

        let latest = service.get_latest(user, "gmail").await.unwrap().unwrap();
        assert_eq!(latest.data, "v2");

        let all = service.get_all(user).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version, 2);
    }
}
