//! Build records.

use serde::{Deserialize, Serialize};

use crate::Status;

/// What triggered a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Push,
    PullRequest,
    Tag,
    Cron,
    Custom,
}

/// A single execution of a repository's pipeline, identified by
/// `(id, repo_id, number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub status: Status,
    pub event: Event,
    /// Branch the build was triggered from.
    pub source: String,
    /// Full git reference, e.g. `refs/heads/master`.
    pub reference: String,
    /// Commit sha the build runs against; commit statuses report to it.
    pub after: String,
    pub message: String,
    pub author: String,
    pub started: i64,
    pub finished: i64,
    pub created: i64,
    pub updated: i64,
    pub version: i64,
}

impl Build {
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

impl Default for Build {
    fn default() -> Self {
        Self {
            id: 0,
            repo_id: 0,
            number: 0,
            status: Status::Pending,
            event: Event::Push,
            source: String::new(),
            reference: String::new(),
            after: String::new(),
            message: String::new(),
            author: String::new(),
            started: 0,
            finished: 0,
            created: 0,
            updated: 0,
            version: 1,
        }
    }
}
