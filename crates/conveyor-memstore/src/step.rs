//! Step table.

use async_trait::async_trait;

use conveyor_core::store::StepStore;
use conveyor_core::{Error, Result, Step};

use crate::MemStore;

#[async_trait]
impl StepStore for MemStore {
    async fn find(&self, id: i64) -> Result<Step> {
        self.tables
            .lock()
            .steps
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("step {id}")))
    }

    async fn list(&self, stage_id: i64) -> Result<Vec<Step>> {
        let mut steps: Vec<Step> = self
            .tables
            .lock()
            .steps
            .values()
            .filter(|s| s.stage_id == stage_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.number);
        Ok(steps)
    }

    async fn update(&self, step: &mut Step) -> Result<()> {
        let mut tables = self.tables.lock();
        let row = tables
            .steps
            .get_mut(&step.id)
            .ok_or_else(|| Error::NotFound(format!("step {}", step.id)))?;
        if row.version != step.version {
            return Err(Error::OptimisticLock);
        }
        step.version += 1;
        *row = step.clone();
        Ok(())
    }
}
