//! Stage completion lifecycle.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use conveyor_core::service::{
    LogStream, Message, Pubsub, Scheduler, StatusInput, StatusService, WebhookAction,
    WebhookEvent, WebhookPayload, WebhookSender,
};
use conveyor_core::status::build_status_from_stages;
use conveyor_core::store::{BuildStore, RepoStore, StageStore, StepStore, UserStore};
use conveyor_core::{unix_now, Error, Result, Stage};

/// Persists a stage's terminal status, completes the build when it was the
/// last stage out, frees the queue slot and tears down live log streams.
pub(crate) struct Teardown {
    pub builds: Arc<dyn BuildStore>,
    pub events: Arc<dyn Pubsub>,
    pub repos: Arc<dyn RepoStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub stages: Arc<dyn StageStore>,
    pub status: Arc<dyn StatusService>,
    pub steps: Arc<dyn StepStore>,
    pub streams: Arc<dyn LogStream>,
    pub users: Arc<dyn UserStore>,
    pub webhook: Arc<dyn WebhookSender>,
}

impl Teardown {
    pub async fn run(&self, stage: &mut Stage) -> Result<()> {
        debug!(
            stage_id = stage.id,
            stage_name = %stage.name,
            stage_status = %stage.status,
            "manager: stage complete"
        );

        let mut current = self.stages.find(stage.id).await?;
        if !current.is_done() {
            current.status = stage.status;
            if current.stopped == 0 {
                current.stopped = unix_now();
            }
            current.updated = unix_now();
            self.stages.update(&mut current).await?;
        }
        let steps = std::mem::take(&mut stage.steps);
        *stage = current;
        stage.steps = steps;

        let mut build = self.builds.find(stage.build_id).await?;
        let siblings = self.stages.list_steps(build.id).await?;
        if !build.is_done() && !siblings.is_empty() && siblings.iter().all(|s| s.is_done()) {
            build.status = build_status_from_stages(&siblings);
            build.finished = unix_now();
            if build.started == 0 {
                build.started = build.finished;
            }
            build.updated = unix_now();
            match self.builds.update(&mut build).await {
                Err(Error::OptimisticLock) => {
                    debug!(build_id = build.id, "manager: build completed concurrently");
                    build = self.builds.find(stage.build_id).await?;
                }
                Err(err) => return Err(err),
                Ok(()) => {}
            }
        }

        // Freed concurrency slots are re-evaluated on the next pass.
        if let Err(err) = self.scheduler.schedule(stage).await {
            warn!(stage_id = stage.id, error = %err, "manager: cannot signal queue");
        }

        match self.steps.list(stage.id).await {
            Ok(steps) => {
                for step in steps {
                    if let Err(err) = self.streams.delete(step.id).await {
                        debug!(step_id = step.id, error = %err, "manager: cannot teardown log stream");
                    }
                }
            }
            Err(err) => warn!(stage_id = stage.id, error = %err, "manager: cannot list steps"),
        }

        let repo = self.repos.find(build.repo_id).await?;

        match serde_json::to_vec(&build) {
            Ok(data) => {
                let message = Message {
                    repo: repo.slug.clone(),
                    data: Bytes::from(data),
                };
                if let Err(err) = self.events.publish(message).await {
                    warn!(error = %err, "manager: cannot publish event");
                }
            }
            Err(err) => warn!(error = %err, "manager: cannot encode event"),
        }

        if build.is_done() {
            match self.users.find(repo.user_id).await {
                Ok(user) => {
                    let input = StatusInput {
                        repo: &repo,
                        build: &build,
                    };
                    if let Err(err) = self.status.send(&user, input).await {
                        warn!(build_id = build.id, error = %err, "manager: cannot publish status");
                    }
                }
                Err(err) => {
                    warn!(repo = %repo.slug, error = %err, "manager: cannot find repository owner")
                }
            }
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use conveyor_core::store::{BuildStore, StageStore, StepStore};
    use conveyor_core::Status;
    use std::sync::atomic::Ordering;

    async fn finish_steps(fx: &Fixture, status: Status) {
        for id in &fx.step_ids {
            let mut step = StepStore::find(&*fx.store, *id).await.unwrap();
            step.status = status;
            step.started = 1;
            step.stopped = 2;
            StepStore::update(&*fx.store, &mut step).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_last_stage_out_completes_the_build() {
        let fx = Fixture::new().await;
        finish_steps(&fx, Status::Passing).await;

        let mut stage = StageStore::find(&*fx.store, fx.stage_id).await.unwrap();
        stage.status = Status::Passing;
        fx.teardown().run(&mut stage).await.unwrap();

        let build = BuildStore::find(&*fx.store, fx.build_id).await.unwrap();
        assert_eq!(build.status, Status::Passing);
        assert_ne!(build.finished, 0);

        // Completion frees a slot: the queue must be nudged.
        assert_eq!(fx.scheduler.schedules.load(Ordering::Relaxed), 1);
        // Completed builds report a commit status.
        assert_eq!(fx.status.sent.lock().as_slice(), &[fx.build_id]);
    }

    #[tokio::test]
    async fn test_teardown_deletes_live_log_streams() {
        let fx = Fixture::new().await;
        finish_steps(&fx, Status::Passing).await;
        for id in &fx.step_ids {
            fx.streams.create(*id).await.unwrap();
        }
        assert_eq!(fx.streams.stream_count(), 2);

        let mut stage = StageStore::find(&*fx.store, fx.stage_id).await.unwrap();
        stage.status = Status::Passing;
        fx.teardown().run(&mut stage).await.unwrap();
        assert_eq!(fx.streams.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_stage_fails_the_build() {
        let fx = Fixture::new().await;
        finish_steps(&fx, Status::Failing).await;

        let mut stage = StageStore::find(&*fx.store, fx.stage_id).await.unwrap();
        stage.status = Status::Failing;
        fx.teardown().run(&mut stage).await.unwrap();

        let build = BuildStore::find(&*fx.store, fx.build_id).await.unwrap();
        assert_eq!(build.status, Status::Failing);
    }
}
