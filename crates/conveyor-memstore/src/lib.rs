//! In-memory store for the Conveyor CI server.
//!
//! One [`MemStore`] holds every table and implements each store trait, so a
//! single `Arc<MemStore>` can be handed out as all six collaborators. Ids
//! are assigned from one process-wide sequence because dispatch eligibility
//! orders records by id. Updates are version-checked and fail with
//! `Error::OptimisticLock` when the row changed since it was read, which is
//! how racing agents are linearized.

mod build;
mod repo;
mod secret;
mod stage;
mod step;
mod user;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use conveyor_core::{Build, Repository, Secret, Stage, Step, User};

#[derive(Default)]
pub(crate) struct Tables {
    pub builds: HashMap<i64, Build>,
    pub stages: HashMap<i64, Stage>,
    pub steps: HashMap<i64, Step>,
    pub repos: HashMap<i64, Repository>,
    pub users: HashMap<i64, User>,
    pub secrets: HashMap<i64, Secret>,
}

#[derive(Default)]
pub struct MemStore {
    pub(crate) tables: Mutex<Tables>,
    seq: AtomicI64,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            seq: AtomicI64::new(0),
        }
    }

    fn next_id(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn create_user(&self, user: &mut User) {
        user.id = self.next_id();
        self.tables.lock().users.insert(user.id, user.clone());
    }

    pub fn create_repo(&self, repo: &mut Repository) {
        repo.id = self.next_id();
        if repo.slug.is_empty() {
            repo.slug = format!("{}/{}", repo.namespace, repo.name);
        }
        self.tables.lock().repos.insert(repo.id, repo.clone());
    }

    pub fn create_secret(&self, secret: &mut Secret) {
        secret.id = self.next_id();
        self.tables.lock().secrets.insert(secret.id, secret.clone());
    }

    pub fn create_build(&self, build: &mut Build) {
        build.id = self.next_id();
        build.version = 1;
        self.tables.lock().builds.insert(build.id, build.clone());
    }

    /// Stores the stage without its embedded steps or denormalized build;
    /// those are joined back on by the list operations.
    pub fn create_stage(&self, stage: &mut Stage) {
        stage.id = self.next_id();
        stage.version = 1;
        let mut row = stage.clone();
        row.steps = Vec::new();
        row.build = None;
        self.tables.lock().stages.insert(row.id, row);
    }

    pub fn create_step(&self, step: &mut Step) {
        step.id = self.next_id();
        step.version = 1;
        self.tables.lock().steps.insert(step.id, step.clone());
    }
}
