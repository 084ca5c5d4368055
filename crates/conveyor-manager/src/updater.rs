//! Step status propagation.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use conveyor_core::service::{
    Message, Pubsub, WebhookAction, WebhookEvent, WebhookPayload, WebhookSender,
};
use conveyor_core::status::{build_status_from_stages, stage_status_from_steps};
use conveyor_core::store::{BuildStore, RepoStore, StageStore, StepStore};
use conveyor_core::{unix_now, Error, Result, Status, Step};

/// Persists a step change and ripples the implied stage and build
/// transitions outward, then fans the snapshot out to observers.
pub(crate) struct Updater {
    pub builds: Arc<dyn BuildStore>,
    pub events: Arc<dyn Pubsub>,
    pub repos: Arc<dyn RepoStore>,
    pub stages: Arc<dyn StageStore>,
    pub steps: Arc<dyn StepStore>,
    pub webhook: Arc<dyn WebhookSender>,
}

impl Updater {
    pub async fn update(&self, step: &mut Step) -> Result<()> {
        self.steps.update(step).await?;

        let mut stage = self.stages.find(step.stage_id).await?;
        let steps = self.steps.list(stage.id).await?;

        // Recompute the stage from its steps. The recompute is pure and
        // idempotent, so replays converge on the same state.
        let mut stage_changed = false;
        let next = stage_status_from_steps(&steps);
        if next != stage.status && !stage.status.is_done() {
            if next == Status::Running {
                stage.status = Status::Running;
                if stage.started == 0 {
                    stage.started = unix_now();
                }
                stage_changed = true;
            } else if next.is_done() {
                stage.status = next;
                if stage.stopped == 0 {
                    stage.stopped = unix_now();
                }
                stage_changed = true;
            }
        }
        if stage_changed {
            stage.updated = unix_now();
            self.stages.update(&mut stage).await?;
        }

        let mut build = self.builds.find(stage.build_id).await?;
        let mut build_changed = false;
        if build.status == Status::Pending && stage.status == Status::Running {
            build.status = Status::Running;
            if build.started == 0 {
                build.started = unix_now();
            }
            build_changed = true;
        }
        if stage.status.is_done() && !build.status.is_done() {
            let siblings = self.stages.list_steps(build.id).await?;
            if !siblings.is_empty() && siblings.iter().all(|s| s.is_done()) {
                build.status = build_status_from_stages(&siblings);
                build.finished = unix_now();
                build_changed = true;
            }
        }
        if build_changed {
            match self.builds.update(&mut build).await {
                Err(Error::OptimisticLock) => {
                    // Another stage of the same build raced us; its write
                    // carries an equivalent recompute.
                    debug!(build_id = build.id, "manager: build updated concurrently");
                    build = self.builds.find(stage.build_id).await?;
                    build_changed = false;
                }
                Err(err) => return Err(err),
                Ok(()) => {}
            }
        }

        // Fan out: one event per affected entity, one webhook for the build.
        let repo = self.repos.find(build.repo_id).await?;
        self.publish(&repo.slug, step).await;
        if stage_changed {
            self.publish(&repo.slug, &stage).await;
        }
        if build_changed {
            self.publish(&repo.slug, &build).await;
        }
        let payload = WebhookPayload {
            event: WebhookEvent::Build,
            action: WebhookAction::Updated,
            repo: &repo,
            build: &build,
        };
        if let Err(err) = self.webhook.send(&payload).await {
            warn!(build_id = build.id, error = %err, "manager: cannot send webhook");
        }
        Ok(())
    }

    async fn publish<T: serde::Serialize>(&self, slug: &str, entity: &T) {
        let data = match serde_json::to_vec(entity) {
            Ok(data) => Bytes::from(data),
            Err(err) => {
                warn!(error = %err, "manager: cannot encode event");
                return;
            }
        };
        let message = Message {
            repo: slug.to_string(),
            data,
        };
        if let Err(err) = self.events.publish(message).await {
            warn!(error = %err, "manager: cannot publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use conveyor_core::store::{BuildStore, StageStore, StepStore};

    #[tokio::test]
    async fn test_first_step_start_marks_stage_and_build_running() {
        let fx = Fixture::new().await;
        let mut step = StepStore::find(&*fx.store, fx.step_ids[0]).await.unwrap();
        step.status = Status::Running;
        step.started = 42;
        fx.updater().update(&mut step).await.unwrap();

        let stage = StageStore::find(&*fx.store, fx.stage_id).await.unwrap();
        assert_eq!(stage.status, Status::Running);
        assert_ne!(stage.started, 0);

        let build = BuildStore::find(&*fx.store, fx.build_id).await.unwrap();
        assert_eq!(build.status, Status::Running);
        assert_ne!(build.started, 0);
    }

    #[tokio::test]
    async fn test_last_step_terminal_completes_stage_and_build() {
        let fx = Fixture::new().await;
        for (i, id) in fx.step_ids.clone().into_iter().enumerate() {
            let mut step = StepStore::find(&*fx.store, id).await.unwrap();
            step.status = if i == 0 {
                Status::Passing
            } else {
                Status::Failing
            };
            step.started = 1;
            step.stopped = 2;
            fx.updater().update(&mut step).await.unwrap();
        }

        let stage = StageStore::find(&*fx.store, fx.stage_id).await.unwrap();
        assert_eq!(stage.status, Status::Failing);
        assert_ne!(stage.stopped, 0);

        let build = BuildStore::find(&*fx.store, fx.build_id).await.unwrap();
        assert_eq!(build.status, Status::Failing);
        assert_ne!(build.finished, 0);
    }

    #[tokio::test]
    async fn test_update_fans_out_webhook_per_call() {
        let fx = Fixture::new().await;
        let mut step = StepStore::find(&*fx.store, fx.step_ids[0]).await.unwrap();
        step.status = Status::Running;
        step.started = 1;
        fx.updater().update(&mut step).await.unwrap();
        assert_eq!(fx.webhook.sent(), 1);
    }
}
