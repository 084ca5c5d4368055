//! Shared fixtures for manager tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use conveyor_core::repo::Repository;
use conveyor_core::secret::Secret;
use conveyor_core::service::{
    ConfigArgs, ConfigService, Filter, Netrc, NetrcService, Scheduler, StatusInput,
    StatusService, System, WebhookAction, WebhookPayload, WebhookSender,
};
use conveyor_core::user::User;
use conveyor_core::{Build, Error, Result, Stage, Status, Step};
use conveyor_memstore::MemStore;
use conveyor_stream::{Hub, LiveLogs, MemLogStore};

use crate::canceler::Canceler;
use crate::manager::Manager;
use crate::setup::Setup;
use crate::teardown::Teardown;
use crate::updater::Updater;

/// Scheduler double that records hints and cancellation signals,
/// resolving stages through the fixture store like the real one.
pub struct RecordingScheduler {
    pub store: Arc<MemStore>,
    pub schedules: AtomicUsize,
    pub cancelled_builds: Mutex<HashSet<i64>>,
}

impl RecordingScheduler {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self {
            store,
            schedules: AtomicUsize::new(0),
            cancelled_builds: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule(&self, _stage: &Stage) -> Result<()> {
        self.schedules.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn request(&self, _filter: Filter, _cancel: CancellationToken) -> Result<Stage> {
        Err(Error::Internal("not dispatchable in tests".to_string()))
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    async fn paused(&self) -> bool {
        false
    }

    async fn cancel(&self, build_id: i64) -> Result<()> {
        self.cancelled_builds.lock().insert(build_id);
        Ok(())
    }

    async fn cancelled(&self, stage_id: i64) -> Result<bool> {
        let stage = conveyor_core::store::StageStore::find(&*self.store, stage_id).await?;
        Ok(self.cancelled_builds.lock().contains(&stage.build_id))
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub sent: Mutex<Vec<i64>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl StatusService for RecordingStatus {
    async fn send(&self, _user: &User, input: StatusInput<'_>) -> Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::Internal("status endpoint down".to_string()));
        }
        self.sent.lock().push(input.build.id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWebhook {
    pub actions: Mutex<Vec<WebhookAction>>,
}

impl RecordingWebhook {
    pub fn sent(&self) -> usize {
        self.actions.lock().len()
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhook {
    async fn send(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        self.actions.lock().push(payload.action);
        Ok(())
    }
}

pub struct StaticConfig;

#[async_trait]
impl ConfigService for StaticConfig {
    async fn find(&self, _args: ConfigArgs<'_>) -> Result<String> {
        Ok("kind: pipeline".to_string())
    }
}

pub struct StaticNetrc;

#[async_trait]
impl NetrcService for StaticNetrc {
    async fn create(&self, user: &User, repo: &Repository) -> Result<Netrc> {
        Ok(Netrc {
            machine: repo.clone_url.clone(),
            login: user.login.clone(),
            password: user.token.clone(),
        })
    }
}

/// A seeded world: one user, one repo with two secrets, one pending build
/// with a single two-step stage.
pub struct Fixture {
    pub store: Arc<MemStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub status: Arc<RecordingStatus>,
    pub webhook: Arc<RecordingWebhook>,
    pub events: Arc<Hub>,
    pub streams: Arc<LiveLogs>,
    pub logs: Arc<MemLogStore>,
    pub user_id: i64,
    pub repo: Repository,
    pub build_id: i64,
    pub stage_id: i64,
    pub step_ids: Vec<i64>,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemStore::new());

        let mut user = User {
            login: "octocat".to_string(),
            token: "topsecret".to_string(),
            active: true,
            ..User::default()
        };
        store.create_user(&mut user);

        let mut repo = Repository {
            user_id: user.id,
            namespace: "octocat".to_string(),
            name: "hello-world".to_string(),
            clone_url: "https://github.com/octocat/hello-world.git".to_string(),
            ..Repository::default()
        };
        store.create_repo(&mut repo);

        for (name, pull_request) in [("docker_password", false), ("coverage_token", true)] {
            let mut secret = Secret {
                repo_id: repo.id,
                name: name.to_string(),
                data: "hunter2".to_string(),
                pull_request,
                ..Secret::default()
            };
            store.create_secret(&mut secret);
        }

        let mut build = Build {
            repo_id: repo.id,
            number: 1,
            status: Status::Pending,
            source: "master".to_string(),
            after: "abc1234".to_string(),
            ..Build::default()
        };
        store.create_build(&mut build);

        let mut stage = Stage {
            repo_id: repo.id,
            build_id: build.id,
            number: 1,
            name: "build".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
            status: Status::Pending,
            ..Stage::default()
        };
        store.create_stage(&mut stage);

        let mut step_ids = Vec::new();
        for (number, name) in [(1, "clone"), (2, "test")] {
            let mut step = Step {
                stage_id: stage.id,
                number,
                name: name.to_string(),
                ..Step::default()
            };
            store.create_step(&mut step);
            step_ids.push(step.id);
        }

        Self {
            scheduler: Arc::new(RecordingScheduler::new(store.clone())),
            store,
            status: Arc::new(RecordingStatus::default()),
            webhook: Arc::new(RecordingWebhook::default()),
            events: Arc::new(Hub::new()),
            streams: Arc::new(LiveLogs::new()),
            logs: Arc::new(MemLogStore::new()),
            user_id: user.id,
            repo,
            build_id: build.id,
            stage_id: stage.id,
            step_ids,
        }
    }

    pub fn updater(&self) -> Updater {
        Updater {
            builds: self.store.clone(),
            events: self.events.clone(),
            repos: self.store.clone(),
            stages: self.store.clone(),
            steps: self.store.clone(),
            webhook: self.webhook.clone(),
        }
    }

    pub fn setup(&self) -> Setup {
        Setup {
            builds: self.store.clone(),
            events: self.events.clone(),
            repos: self.store.clone(),
            stages: self.store.clone(),
            status: self.status.clone(),
            users: self.store.clone(),
            webhook: self.webhook.clone(),
        }
    }

    pub fn teardown(&self) -> Teardown {
        Teardown {
            builds: self.store.clone(),
            events: self.events.clone(),
            repos: self.store.clone(),
            scheduler: self.scheduler.clone(),
            stages: self.store.clone(),
            status: self.status.clone(),
            steps: self.store.clone(),
            streams: self.streams.clone(),
            users: self.store.clone(),
            webhook: self.webhook.clone(),
        }
    }

    pub fn canceler(&self) -> Canceler {
        Canceler {
            builds: self.store.clone(),
            scheduler: self.scheduler.clone(),
            stages: self.store.clone(),
            status: self.status.clone(),
            steps: self.store.clone(),
            webhook: self.webhook.clone(),
        }
    }

    pub fn manager(&self) -> Manager {
        Manager {
            builds: self.store.clone(),
            config: Arc::new(StaticConfig),
            events: self.events.clone(),
            logs: self.logs.clone(),
            streams: self.streams.clone(),
            netrcs: Arc::new(StaticNetrc),
            repos: self.store.clone(),
            scheduler: self.scheduler.clone(),
            secrets: self.store.clone(),
            status: self.status.clone(),
            stages: self.store.clone(),
            steps: self.store.clone(),
            system: System {
                host: "conveyor.local".to_string(),
                link: "https://conveyor.local".to_string(),
                version: "0.1.0".to_string(),
            },
            users: self.store.clone(),
            webhook: self.webhook.clone(),
        }
    }
}
