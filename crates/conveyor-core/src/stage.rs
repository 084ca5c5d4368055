//! Stage records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Build, Status, Step};

/// A unit of pipeline execution on a single agent: an ordered list of steps
/// constrained by platform filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub repo_id: i64,
    pub build_id: i64,
    pub number: i64,
    pub name: String,
    pub os: String,
    pub arch: String,
    /// Architecture variant, e.g. `v7` for arm. Empty means any.
    pub variant: String,
    /// Kernel version pin for windows agents. Empty means any.
    pub kernel: String,
    /// Hostname of the agent that accepted the stage. Empty means
    /// unassigned; it is only ever set through an optimistic update.
    pub machine: String,
    /// Max concurrent same-name stages per repository. Zero is unlimited.
    pub limit: i64,
    pub status: Status,
    pub started: i64,
    pub stopped: i64,
    pub created: i64,
    pub updated: i64,
    pub version: i64,
    pub on_success: bool,
    pub on_failure: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    /// Denormalized parent build, populated by `list_incomplete` so the
    /// queue can evaluate branch policy without extra reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
}

impl Stage {
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            id: 0,
            repo_id: 0,
            build_id: 0,
            number: 0,
            name: String::new(),
            os: String::new(),
            arch: String::new(),
            variant: String::new(),
            kernel: String::new(),
            machine: String::new(),
            limit: 0,
            status: Status::Pending,
            started: 0,
            stopped: 0,
            created: 0,
            updated: 0,
            version: 1,
            on_success: true,
            on_failure: false,
            depends_on: Vec::new(),
            labels: HashMap::new(),
            steps: Vec::new(),
            build: None,
        }
    }
}
