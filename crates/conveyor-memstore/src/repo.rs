//! Repository table.

use async_trait::async_trait;

use conveyor_core::repo::Repository;
use conveyor_core::store::RepoStore;
use conveyor_core::{Error, Result};

use crate::MemStore;

#[async_trait]
impl RepoStore for MemStore {
    async fn find(&self, id: i64) -> Result<Repository> {
        self.tables
            .lock()
            .repos
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("repository {id}")))
    }

    async fn find_name(&self, namespace: &str, name: &str) -> Result<Repository> {
        self.tables
            .lock()
            .repos
            .values()
            .find(|r| r.namespace == namespace && r.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("repository {namespace}/{name}")))
    }
}
