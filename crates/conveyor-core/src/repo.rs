//! Repository records.

use serde::{Deserialize, Serialize};

/// A source repository registered with the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    pub namespace: String,
    pub name: String,
    /// `namespace/name`.
    pub slug: String,
    pub clone_url: String,
    /// Default branch.
    pub branch: String,
    pub private: bool,
    /// Path of the pipeline definition inside the repository.
    pub config_path: String,
    /// Per-stage execution timeout in minutes.
    pub timeout: i64,
}

impl Default for Repository {
    fn default() -> Self {
        Self {
            id: 0,
            user_id: 0,
            namespace: String::new(),
            name: String::new(),
            slug: String::new(),
            clone_url: String::new(),
            branch: "master".to_string(),
            private: false,
            config_path: ".conveyor.yml".to_string(),
            timeout: 60,
        }
    }
}
