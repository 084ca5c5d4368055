//! Step records.

use serde::{Deserialize, Serialize};

use crate::Status;

/// A single container invocation within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub stage_id: i64,
    pub number: i64,
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub exit_code: i32,
    pub started: i64,
    pub stopped: i64,
    pub version: i64,
}

impl Step {
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

impl Default for Step {
    fn default() -> Self {
        Self {
            id: 0,
            stage_id: 0,
            number: 0,
            name: String::new(),
            status: Status::Pending,
            error: String::new(),
            exit_code: 0,
            started: 0,
            stopped: 0,
            version: 1,
        }
    }
}
