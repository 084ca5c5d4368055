//! Commit status reporting.

use async_trait::async_trait;
use tracing::info;

use conveyor_core::service::{StatusInput, StatusService};
use conveyor_core::user::User;
use conveyor_core::Result;

/// Records the status transition in the server log. SCM-specific status
/// backends plug in behind the same trait.
pub struct LogStatusService;

#[async_trait]
impl StatusService for LogStatusService {
    async fn send(&self, user: &User, input: StatusInput<'_>) -> Result<()> {
        info!(
            user = %user.login,
            repo = %input.repo.slug,
            build = input.build.number,
            commit = %input.build.after,
            status = %input.build.status,
            "status: commit status"
        );
        Ok(())
    }
}
