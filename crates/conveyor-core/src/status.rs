//! The status machine shared by builds, stages and steps.

use serde::{Deserialize, Serialize};

use crate::{Stage, Step};

/// Lifecycle status. Records transition monotonically:
/// `waiting_on_deps -> pending -> running -> terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    WaitingOnDeps,
    Pending,
    Running,
    Passing,
    Failing,
    Killed,
    Skipped,
    Error,
    Blocked,
    Declined,
}

impl Status {
    /// Whether the status is terminal. Terminal records accept no further
    /// status transitions.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Status::Passing
                | Status::Failing
                | Status::Killed
                | Status::Skipped
                | Status::Error
                | Status::Declined
        )
    }

    /// Whether the record may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Status::Pending | Status::Running)
    }

    fn severity(&self) -> u8 {
        match self {
            Status::Skipped => 0,
            Status::Killed => 4,
            Status::Error => 3,
            Status::Failing => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::WaitingOnDeps => "waiting_on_deps",
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Passing => "passing",
            Status::Failing => "failing",
            Status::Killed => "killed",
            Status::Skipped => "skipped",
            Status::Error => "error",
            Status::Blocked => "blocked",
            Status::Declined => "declined",
        };
        f.write_str(s)
    }
}

/// Fold terminal statuses into one. `killed` dominates `error` dominates
/// `failing` dominates `passing`; a record whose children were all skipped
/// is itself skipped.
pub fn aggregate_status<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses
        .into_iter()
        .max_by_key(Status::severity)
        .unwrap_or(Status::Skipped)
}

/// Recompute a stage's status from its steps. Idempotent: the result only
/// depends on the step statuses, never on the stage's current value.
pub fn stage_status_from_steps(steps: &[Step]) -> Status {
    if !steps.is_empty() && steps.iter().all(|s| s.status.is_done()) {
        return aggregate_status(steps.iter().map(|s| s.status));
    }
    if steps
        .iter()
        .any(|s| s.status == Status::Running || s.started != 0)
    {
        Status::Running
    } else {
        Status::Pending
    }
}

/// Recompute a build's status from its stages. Idempotent for the same
/// reason as [`stage_status_from_steps`].
pub fn build_status_from_stages(stages: &[Stage]) -> Status {
    if !stages.is_empty() && stages.iter().all(|s| s.status.is_done()) {
        return aggregate_status(stages.iter().map(|s| s.status));
    }
    if stages
        .iter()
        .any(|s| s.status == Status::Running || s.started != 0)
    {
        Status::Running
    } else {
        Status::Pending
    }
}
