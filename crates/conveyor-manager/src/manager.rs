//! The build manager façade.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use conveyor_core::build::Event;
use conveyor_core::repo::Repository;
use conveyor_core::secret::Secret;
use conveyor_core::service::{
    ConfigArgs, ConfigService, Filter, Line, LogStore, LogStream, Netrc, NetrcService, Pubsub,
    Scheduler, StatusService, System, WebhookSender,
};
use conveyor_core::store::{
    BuildStore, RepoStore, SecretStore, StageStore, StepStore, UserStore,
};
use conveyor_core::user::User;
use conveyor_core::{unix_now, Build, Error, Result, Stage, Status, Step};

use crate::canceler::Canceler;
use crate::setup::Setup;
use crate::teardown::Teardown;
use crate::updater::Updater;

/// The minimum amount of information an agent needs to execute a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub repo: Repository,
    pub build: Build,
    pub stage: Stage,
    pub config: String,
    pub secrets: Vec<Secret>,
    pub system: System,
}

/// Encapsulates the build operations exposed to agents, so runners never
/// talk to stores or the scheduler directly.
#[async_trait]
pub trait BuildManager: Send + Sync {
    /// Request the next available stage matching the filter.
    async fn request(&self, filter: Filter, cancel: CancellationToken) -> Result<Stage>;

    /// Claim a stage for a machine. Exactly one of any set of racing
    /// agents succeeds; the rest observe `Error::OptimisticLock`.
    async fn accept(&self, stage_id: i64, machine: &str) -> Result<()>;

    /// Fetch the full execution context for an accepted stage.
    async fn details(&self, stage_id: i64) -> Result<Context>;

    /// Issue clone credentials for the repository.
    async fn netrc(&self, repo_id: i64) -> Result<Netrc>;

    /// Signal that a step is about to start.
    async fn before(&self, step: &mut Step) -> Result<()>;

    /// Signal that a step is complete.
    async fn after(&self, step: &mut Step) -> Result<()>;

    /// Signal that a stage is about to start.
    async fn before_all(&self, stage: &mut Stage) -> Result<()>;

    /// Signal that a stage is complete.
    async fn after_all(&self, stage: &mut Stage) -> Result<()>;

    /// Poll for build cancellation. Returns true when the stage's build
    /// was cancelled or the stage is already complete.
    async fn watch(&self, stage_id: i64) -> Result<bool>;

    /// Append a line to the step's live log stream.
    async fn write(&self, step_id: i64, line: &Line) -> Result<()>;

    /// Archive the step's complete logs.
    async fn upload(
        &self,
        step_id: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<()>;

    /// Archive the step's complete logs from a byte buffer.
    async fn upload_bytes(&self, step_id: i64, data: Bytes) -> Result<()>;

    /// Cancel a pending or running build.
    async fn cancel(
        &self,
        build: &mut Build,
        repo: &Repository,
        user: Option<&User>,
    ) -> Result<()>;
}

/// Default [`BuildManager`] implementation. Holds every collaborator by
/// reference; sub-operations receive the subset they need and never
/// reference the manager back.
pub struct Manager {
    pub builds: Arc<dyn BuildStore>,
    pub config: Arc<dyn ConfigService>,
    pub events: Arc<dyn Pubsub>,
    pub logs: Arc<dyn LogStore>,
    pub streams: Arc<dyn LogStream>,
    pub netrcs: Arc<dyn NetrcService>,
    pub repos: Arc<dyn RepoStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub secrets: Arc<dyn SecretStore>,
    pub status: Arc<dyn StatusService>,
    pub stages: Arc<dyn StageStore>,
    pub steps: Arc<dyn StepStore>,
    pub system: System,
    pub users: Arc<dyn UserStore>,
    pub webhook: Arc<dyn WebhookSender>,
}

impl Manager {
    fn updater(&self) -> Updater {
        Updater {
            builds: self.builds.clone(),
            events: self.events.clone(),
            repos: self.repos.clone(),
            stages: self.stages.clone(),
            steps: self.steps.clone(),
            webhook: self.webhook.clone(),
        }
    }

    fn setup(&self) -> Setup {
        Setup {
            builds: self.builds.clone(),
            events: self.events.clone(),
            repos: self.repos.clone(),
            stages: self.stages.clone(),
            status: self.status.clone(),
            users: self.users.clone(),
            webhook: self.webhook.clone(),
        }
    }

    fn teardown(&self) -> Teardown {
        Teardown {
            builds: self.builds.clone(),
            events: self.events.clone(),
            repos: self.repos.clone(),
            scheduler: self.scheduler.clone(),
            stages: self.stages.clone(),
            status: self.status.clone(),
            steps: self.steps.clone(),
            streams: self.streams.clone(),
            users: self.users.clone(),
            webhook: self.webhook.clone(),
        }
    }

    fn canceler(&self) -> Canceler {
        Canceler {
            builds: self.builds.clone(),
            scheduler: self.scheduler.clone(),
            stages: self.stages.clone(),
            status: self.status.clone(),
            steps: self.steps.clone(),
            webhook: self.webhook.clone(),
        }
    }
}

#[async_trait]
impl BuildManager for Manager {
    async fn request(&self, filter: Filter, cancel: CancellationToken) -> Result<Stage> {
        debug!(
            os = %filter.os,
            arch = %filter.arch,
            kernel = %filter.kernel,
            variant = %filter.variant,
            "manager: request queue item"
        );
        match self.scheduler.request(filter, cancel).await {
            Ok(stage) => Ok(stage),
            Err(Error::Cancelled) => {
                debug!("manager: request cancelled");
                Err(Error::Cancelled)
            }
            Err(err) => {
                warn!(error = %err, "manager: request queue item error");
                Err(err)
            }
        }
    }

    async fn accept(&self, stage_id: i64, machine: &str) -> Result<()> {
        debug!(stage_id, machine, "manager: accept stage");

        let mut stage = self.stages.find(stage_id).await?;
        if !stage.machine.is_empty() {
            debug!(stage_id, "manager: stage already assigned, abort");
            return Err(Error::OptimisticLock);
        }

        stage.machine = machine.to_string();
        stage.status = Status::Pending;
        stage.updated = unix_now();

        match self.stages.update(&mut stage).await {
            Err(Error::OptimisticLock) => {
                debug!(stage_id, "manager: stage processed by another agent");
                Err(Error::OptimisticLock)
            }
            Err(err) => {
                warn!(stage_id, error = %err, "manager: cannot update stage");
                Err(err)
            }
            Ok(()) => {
                debug!(stage_id, machine, "manager: stage accepted");
                Ok(())
            }
        }
    }

    async fn details(&self, stage_id: i64) -> Result<Context> {
        debug!(stage_id, "manager: fetching stage details");

        let stage = self.stages.find(stage_id).await?;
        let build = self.builds.find(stage.build_id).await?;
        let repo = self.repos.find(build.repo_id).await?;
        let user = self.users.find(repo.user_id).await?;
        let config = self
            .config
            .find(ConfigArgs {
                user: &user,
                repo: &repo,
                build: &build,
            })
            .await?;
        let secrets: Vec<Secret> = self
            .secrets
            .list(repo.id)
            .await?
            .into_iter()
            .filter(|secret| secret.pull_request || build.event != Event::PullRequest)
            .collect();

        Ok(Context {
            repo,
            build,
            stage,
            config,
            secrets,
            system: self.system.clone(),
        })
    }

    async fn netrc(&self, repo_id: i64) -> Result<Netrc> {
        let repo = self.repos.find(repo_id).await?;
        let user = self.users.find(repo.user_id).await?;
        match self.netrcs.create(&user, &repo).await {
            Ok(netrc) => Ok(netrc),
            Err(err) => {
                warn!(repo = %repo.slug, error = %err, "manager: cannot generate netrc");
                Err(err)
            }
        }
    }

    async fn before(&self, step: &mut Step) -> Result<()> {
        debug!(
            step_id = step.id,
            step_name = %step.name,
            step_status = %step.status,
            "manager: updating step status"
        );

        if let Err(err) = self.streams.create(step.id).await {
            warn!(step_id = step.id, error = %err, "manager: cannot create log stream");
            return Err(err);
        }
        self.updater().update(step).await
    }

    async fn after(&self, step: &mut Step) -> Result<()> {
        debug!(
            step_id = step.id,
            step_name = %step.name,
            step_status = %step.status,
            "manager: updating step status"
        );

        let mut errs = Vec::new();
        if let Err(err) = self.updater().update(step).await {
            warn!(step_id = step.id, error = %err, "manager: cannot update step");
            errs.push(err);
        }
        if let Err(err) = self.streams.delete(step.id).await {
            warn!(step_id = step.id, error = %err, "manager: cannot teardown log stream");
            errs.push(err);
        }
        Error::collect(errs)
    }

    async fn before_all(&self, stage: &mut Stage) -> Result<()> {
        self.setup().run(stage).await
    }

    async fn after_all(&self, stage: &mut Stage) -> Result<()> {
        self.teardown().run(stage).await
    }

    async fn watch(&self, stage_id: i64) -> Result<bool> {
        if self.scheduler.cancelled(stage_id).await? {
            return Ok(true);
        }
        // No cancellation signal; report whether the stage already
        // completed so agents can stop watching finished work.
        let stage = self.stages.find(stage_id).await?;
        Ok(stage.is_done())
    }

    async fn write(&self, step_id: i64, line: &Line) -> Result<()> {
        if let Err(err) = self.streams.write(step_id, line).await {
            warn!(step_id, error = %err, "manager: cannot write to log stream");
            return Err(err);
        }
        Ok(())
    }

    async fn upload(
        &self,
        step_id: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.upload_bytes(step_id, Bytes::from(data)).await
    }

    async fn upload_bytes(&self, step_id: i64, data: Bytes) -> Result<()> {
        if let Err(err) = self.logs.create(step_id, data).await {
            warn!(step_id, error = %err, "manager: cannot upload complete logs");
            return Err(err);
        }
        Ok(())
    }

    async fn cancel(
        &self,
        build: &mut Build,
        repo: &Repository,
        user: Option<&User>,
    ) -> Result<()> {
        self.canceler().cancel(build, repo, user).await
    }
}
