//! Store abstractions.
//!
//! Updates are optimistic: every record carries a version, and an update
//! whose version no longer matches the stored row fails with
//! [`Error::OptimisticLock`](crate::Error::OptimisticLock). The server
//! treats that as a normal race outcome, never retrying blindly.

use async_trait::async_trait;

use crate::{Build, Repository, Result, Secret, Stage, Step, User};

#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Build>;

    /// Find a build by repository and build number.
    async fn find_number(&self, repo_id: i64, number: i64) -> Result<Build>;

    /// Persist the build, bumping its version on success.
    async fn update(&self, build: &mut Build) -> Result<()>;
}

#[async_trait]
pub trait StageStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Stage>;

    /// All stages that have not reached a terminal status, ordered by id,
    /// with the parent build denormalized onto each record.
    async fn list_incomplete(&self) -> Result<Vec<Stage>>;

    /// A build's stages ordered by number, with steps embedded.
    async fn list_steps(&self, build_id: i64) -> Result<Vec<Stage>>;

    /// Persist the stage, bumping its version on success.
    async fn update(&self, stage: &mut Stage) -> Result<()>;
}

#[async_trait]
pub trait StepStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Step>;

    /// A stage's steps ordered by number.
    async fn list(&self, stage_id: i64) -> Result<Vec<Step>>;

    /// Persist the step, bumping its version on success.
    async fn update(&self, step: &mut Step) -> Result<()>;
}

#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Repository>;

    /// Find a repository by namespace and name.
    async fn find_name(&self, namespace: &str, name: &str) -> Result<Repository>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<User>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// All secrets scoped to the repository.
    async fn list(&self, repo_id: i64) -> Result<Vec<Secret>>;
}
