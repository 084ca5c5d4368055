//! Queue and scheduler for the Conveyor CI server.
//!
//! The queue is an in-process matchmaker: agents park worker requests until
//! a pending stage matching their platform shows up, and a single dispatch
//! loop pairs them off. Cancellation signals travel on a side-channel so
//! long-polling agents can observe them.

mod canceller;
mod eligibility;
mod queue;

pub use queue::Queue;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use canceller::Canceller;
use conveyor_core::service::Filter;
use conveyor_core::store::StageStore;
use conveyor_core::{Result, Stage};

/// The process-wide scheduler: the queue plus the cancellation side-channel.
pub struct Scheduler {
    queue: Arc<Queue>,
    canceller: Canceller,
    stages: Arc<dyn StageStore>,
}

impl Scheduler {
    pub fn new(stages: Arc<dyn StageStore>) -> Self {
        Self {
            queue: Arc::new(Queue::new(stages.clone())),
            canceller: Canceller::new(),
            stages,
        }
    }

    /// Start the dispatch loop. The loop runs until `shutdown` fires; its
    /// lifetime is owned by the process entry point.
    pub fn spawn(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        self.queue.clone().spawn(shutdown)
    }
}

#[async_trait]
impl conveyor_core::service::Scheduler for Scheduler {
    async fn schedule(&self, stage: &Stage) -> Result<()> {
        self.queue.schedule(stage);
        Ok(())
    }

    async fn request(&self, filter: Filter, cancel: CancellationToken) -> Result<Stage> {
        self.queue.request(filter, cancel).await
    }

    async fn pause(&self) -> Result<()> {
        self.queue.pause();
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.queue.resume();
        Ok(())
    }

    async fn paused(&self) -> bool {
        self.queue.paused()
    }

    async fn cancel(&self, build_id: i64) -> Result<()> {
        self.canceller.cancel(build_id);
        Ok(())
    }

    async fn cancelled(&self, stage_id: i64) -> Result<bool> {
        let stage = self.stages.find(stage_id).await?;
        Ok(self.canceller.cancelled(stage.build_id))
    }
}
