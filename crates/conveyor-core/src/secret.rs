//! Secret records.

use serde::{Deserialize, Serialize};

/// A named secret scoped to a repository. Secrets with
/// `pull_request == false` are withheld from pull-request builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub id: i64,
    pub repo_id: i64,
    pub name: String,
    pub data: String,
    pub pull_request: bool,
}
