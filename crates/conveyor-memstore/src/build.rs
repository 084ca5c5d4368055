//! Build table.

use async_trait::async_trait;

use conveyor_core::store::BuildStore;
use conveyor_core::{Build, Error, Result};

use crate::MemStore;

#[async_trait]
impl BuildStore for MemStore {
    async fn find(&self, id: i64) -> Result<Build> {
        self.tables
            .lock()
            .builds
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("build {id}")))
    }

    async fn find_number(&self, repo_id: i64, number: i64) -> Result<Build> {
        self.tables
            .lock()
            .builds
            .values()
            .find(|b| b.repo_id == repo_id && b.number == number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("build {number} in repo {repo_id}")))
    }

    async fn update(&self, build: &mut Build) -> Result<()> {
        let mut tables = self.tables.lock();
        let row = tables
            .builds
            .get_mut(&build.id)
            .ok_or_else(|| Error::NotFound(format!("build {}", build.id)))?;
        if row.version != build.version {
            return Err(Error::OptimisticLock);
        }
        build.version += 1;
        *row = build.clone();
        Ok(())
    }
}
