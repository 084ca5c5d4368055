//! Collaborator service traits consumed by the coordination core.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Build, Repository, Result, Stage, User};

/// Platform constraints declared by an agent requesting work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub os: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kernel: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Server identity included in the execution context handed to agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System {
    pub host: String,
    pub link: String,
    pub version: String,
}

/// A single line of live log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    #[serde(rename = "pos")]
    pub number: i64,
    #[serde(rename = "out")]
    pub message: String,
    #[serde(rename = "time")]
    pub timestamp: i64,
}

/// Clone credentials issued per execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

/// Matchmaker between waiting agents and pending stages.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Hint that new work may be available. Non-blocking; redundant hints
    /// are merged into at most one pending wake-up.
    async fn schedule(&self, stage: &Stage) -> Result<()>;

    /// Park the caller until a matching stage is handed off or `cancel`
    /// fires. The returned stage is not yet accepted in the store.
    async fn request(&self, filter: Filter, cancel: CancellationToken) -> Result<Stage>;

    /// Stop dispatching. Requests still enqueue while paused.
    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn paused(&self) -> bool;

    /// Record a build cancellation so long-pollers observe it.
    async fn cancel(&self, build_id: i64) -> Result<()>;

    /// Whether a cancellation was signalled for this stage's build.
    async fn cancelled(&self, stage_id: i64) -> Result<bool>;
}

/// Arguments for resolving a compiled pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfigArgs<'a> {
    pub user: &'a User,
    pub repo: &'a Repository,
    pub build: &'a Build,
}

/// Resolves the compiled pipeline text for a build.
#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn find(&self, args: ConfigArgs<'_>) -> Result<String>;
}

/// Issues short-lived clone credentials.
#[async_trait]
pub trait NetrcService: Send + Sync {
    async fn create(&self, user: &User, repo: &Repository) -> Result<Netrc>;
}

#[derive(Debug, Clone, Copy)]
pub struct StatusInput<'a> {
    pub repo: &'a Repository,
    pub build: &'a Build,
}

/// Pushes a commit status to the SCM for the build's head commit.
#[async_trait]
pub trait StatusService: Send + Sync {
    async fn send(&self, user: &User, input: StatusInput<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Created,
    Updated,
}

/// Payload delivered to configured webhook sinks.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: WebhookEvent,
    pub action: WebhookAction,
    pub repo: &'a Repository,
    pub build: &'a Build,
}

/// Delivers payloads to configured sinks. Delivery is best-effort.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, payload: &WebhookPayload<'_>) -> Result<()>;
}

/// An in-process event published when a build changes.
#[derive(Debug, Clone)]
pub struct Message {
    /// Slug of the repository the event belongs to.
    pub repo: String,
    /// JSON-encoded entity snapshot.
    pub data: Bytes,
}

/// Single-process publish of build events; subscribers are UI live-update
/// sessions.
#[async_trait]
pub trait Pubsub: Send + Sync {
    async fn publish(&self, message: Message) -> Result<()>;

    async fn subscribe(&self) -> mpsc::Receiver<Message>;
}

/// Live append-only log buffer for in-flight steps.
#[async_trait]
pub trait LogStream: Send + Sync {
    async fn create(&self, step_id: i64) -> Result<()>;

    async fn write(&self, step_id: i64, line: &Line) -> Result<()>;

    /// Replay the buffered history and follow subsequent writes.
    async fn tail(&self, step_id: i64) -> Result<(Vec<Line>, mpsc::Receiver<Line>)>;

    async fn delete(&self, step_id: i64) -> Result<()>;
}

/// Write-once archive of a step's complete logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn find(&self, step_id: i64) -> Result<Bytes>;

    async fn create(&self, step_id: i64, data: Bytes) -> Result<()>;
}
