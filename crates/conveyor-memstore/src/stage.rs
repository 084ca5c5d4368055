//! Stage table.

use async_trait::async_trait;

use conveyor_core::store::StageStore;
use conveyor_core::{Error, Result, Stage, Status};

use crate::MemStore;

#[async_trait]
impl StageStore for MemStore {
    async fn find(&self, id: i64) -> Result<Stage> {
        self.tables
            .lock()
            .stages
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("stage {id}")))
    }

    async fn list_incomplete(&self) -> Result<Vec<Stage>> {
        let tables = self.tables.lock();
        let mut stages: Vec<Stage> = tables
            .stages
            .values()
            .filter(|s| matches!(s.status, Status::Pending | Status::Running))
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.id);
        stages.retain(|s| {
            tables
                .builds
                .get(&s.build_id)
                .is_some_and(|b| !b.is_done())
        });
        for stage in &mut stages {
            stage.build = tables.builds.get(&stage.build_id).cloned();
        }
        Ok(stages)
    }

    async fn list_steps(&self, build_id: i64) -> Result<Vec<Stage>> {
        let tables = self.tables.lock();
        let mut stages: Vec<Stage> = tables
            .stages
            .values()
            .filter(|s| s.build_id == build_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.number);
        for stage in &mut stages {
            let mut steps: Vec<_> = tables
                .steps
                .values()
                .filter(|s| s.stage_id == stage.id)
                .cloned()
                .collect();
            steps.sort_by_key(|s| s.number);
            stage.steps = steps;
        }
        Ok(stages)
    }

    async fn update(&self, stage: &mut Stage) -> Result<()> {
        let mut tables = self.tables.lock();
        let row = tables
            .stages
            .get_mut(&stage.id)
            .ok_or_else(|| Error::NotFound(format!("stage {}", stage.id)))?;
        if row.version != stage.version {
            return Err(Error::OptimisticLock);
        }
        stage.version += 1;
        let mut next = stage.clone();
        next.steps = Vec::new();
        next.build = None;
        *row = next;
        Ok(())
    }
}
