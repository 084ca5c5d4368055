//! Build cancellation fan-out.

use std::sync::Arc;
use tracing::{debug, warn};

use conveyor_core::repo::Repository;
use conveyor_core::service::{
    Scheduler, StatusInput, StatusService, WebhookAction, WebhookEvent, WebhookPayload,
    WebhookSender,
};
use conveyor_core::store::{BuildStore, StageStore, StepStore};
use conveyor_core::user::User;
use conveyor_core::{unix_now, Build, Error, Result, Status};

/// Exit code reported for steps terminated by cancellation (SIGINT).
const EXIT_CODE_KILLED: i32 = 130;

/// Forces a pending or running build and all of its incomplete stages and
/// steps to a terminal status, and signals the queue so long-pollers
/// observe the cancellation.
pub(crate) struct Canceler {
    pub builds: Arc<dyn BuildStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub stages: Arc<dyn StageStore>,
    pub status: Arc<dyn StatusService>,
    pub steps: Arc<dyn StepStore>,
    pub webhook: Arc<dyn WebhookSender>,
}

impl Canceler {
    pub async fn cancel(
        &self,
        build: &mut Build,
        repo: &Repository,
        user: Option<&User>,
    ) -> Result<()> {
        if !build.status.is_cancellable() {
            return Err(Error::InvalidState(
                "cannot cancel completed build".to_string(),
            ));
        }

        debug!(build_id = build.id, repo = %repo.slug, "manager: cancel build");

        let now = unix_now();
        build.status = Status::Killed;
        build.finished = now;
        if build.started == 0 {
            build.started = now;
        }
        build.updated = now;
        self.builds.update(build).await?;

        // Unblock watchers before walking the stages; agents poll this.
        self.scheduler.cancel(build.id).await?;

        // The commit status must not diverge from what the UI shows, so a
        // failure here is fatal to the caller.
        if let Some(user) = user {
            let input = StatusInput { repo, build };
            self.status.send(user, input).await?;
        }

        let stages = self.stages.list_steps(build.id).await?;
        for mut stage in stages {
            if stage.is_done() {
                continue;
            }
            if stage.started != 0 {
                stage.status = Status::Killed;
            } else {
                stage.status = Status::Skipped;
                stage.started = now;
            }
            stage.stopped = now;
            stage.updated = now;
            let steps = std::mem::take(&mut stage.steps);
            self.stages.update(&mut stage).await?;

            for mut step in steps {
                if step.is_done() {
                    continue;
                }
                if step.started != 0 {
                    step.status = Status::Killed;
                } else {
                    step.status = Status::Skipped;
                    step.started = now;
                }
                step.stopped = now;
                step.exit_code = EXIT_CODE_KILLED;
                self.steps.update(&mut step).await?;
            }
        }

        let payload = WebhookPayload {
            event: WebhookEvent::Build,
            action: WebhookAction::Updated,
            repo,
            build,
        };
        if let Err(err) = self.webhook.send(&payload).await {
            warn!(build_id = build.id, error = %err, "manager: cannot send global webhook");
        }
        Ok(())
    }
}
