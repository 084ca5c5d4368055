//! Stage entry lifecycle.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use conveyor_core::service::{
    Message, Pubsub, StatusInput, StatusService, WebhookAction, WebhookEvent, WebhookPayload,
    WebhookSender,
};
use conveyor_core::store::{BuildStore, RepoStore, StageStore, UserStore};
use conveyor_core::{unix_now, Error, Result, Stage, Status};

/// Marks a stage running, promotes a pending build, and pushes the new
/// snapshot to every observer.
pub(crate) struct Setup {
    pub builds: Arc<dyn BuildStore>,
    pub events: Arc<dyn Pubsub>,
    pub repos: Arc<dyn RepoStore>,
    pub stages: Arc<dyn StageStore>,
    pub status: Arc<dyn StatusService>,
    pub users: Arc<dyn UserStore>,
    pub webhook: Arc<dyn WebhookSender>,
}

impl Setup {
    pub async fn run(&self, stage: &mut Stage) -> Result<()> {
        debug!(stage_id = stage.id, stage_name = %stage.name, "manager: stage begin");

        let mut current = self.stages.find(stage.id).await?;
        current.status = Status::Running;
        if current.started == 0 {
            current.started = unix_now();
        }
        current.updated = unix_now();
        self.stages.update(&mut current).await?;

        // Hand the persisted row back without losing embedded steps.
        let steps = std::mem::take(&mut stage.steps);
        *stage = current;
        stage.steps = steps;

        let mut build = self.builds.find(stage.build_id).await?;
        if build.status == Status::Pending {
            build.status = Status::Running;
            if build.started == 0 {
                build.started = unix_now();
            }
            build.updated = unix_now();
            match self.builds.update(&mut build).await {
                Err(Error::OptimisticLock) => {
                    // A sibling stage started first; read its write back.
                    debug!(build_id = build.id, "manager: build started concurrently");
                    build = self.builds.find(stage.build_id).await?;
                }
                Err(err) => return Err(err),
                Ok(()) => {}
            }
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
