//! User records.

use serde::{Deserialize, Serialize};

/// A user account, typically the owner of one or more repositories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    /// SCM access token; never serialized to agents or the UI.
    #[serde(skip_serializing, default)]
    pub token: String,
    pub active: bool,
    pub admin: bool,
}
