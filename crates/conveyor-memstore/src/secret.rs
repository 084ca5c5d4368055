//! Secret table.

use async_trait::async_trait;

use conveyor_core::secret::Secret;
use conveyor_core::store::SecretStore;
use conveyor_core::Result;

use crate::MemStore;

#[async_trait]
impl SecretStore for MemStore {
    async fn list(&self, repo_id: i64) -> Result<Vec<Secret>> {
        let mut secrets: Vec<Secret> = self
            .tables
            .lock()
            .secrets
            .values()
            .filter(|s| s.repo_id == repo_id)
            .cloned()
            .collect();
        secrets.sort_by_key(|s| s.id);
        Ok(secrets)
    }
}
