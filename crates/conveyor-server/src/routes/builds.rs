//! Build routes for users.

use axum::extract::{Path, State};
use axum::Json;
use tracing::{debug, warn};

use conveyor_core::Build;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn find(
    State(state): State<AppState>,
    Path((namespace, name, number)): Path<(String, String, i64)>,
) -> Result<Json<Build>, ApiError> {
    let repo = state.repos.find_name(&namespace, &name).await?;
    let build = state.builds.find_number(repo.id, number).await?;
    Ok(Json(build))
}

/// Cancel a pending or running build. The owner lookup is best-effort:
/// without it the SCM status update is skipped, but the build still dies.
pub async fn cancel(
    State(state): State<AppState>,
    Path((namespace, name, number)): Path<(String, String, i64)>,
) -> Result<Json<Build>, ApiError> {
    let repo = state.repos.find_name(&namespace, &name).await.map_err(|err| {
        debug!(%namespace, %name, error = %err, "api: cannot find repository");
        ApiError::from(err)
    })?;

    let user = match state.users.find(repo.user_id).await {
        Ok(user) => Some(user),
        Err(err) => {
            debug!(%namespace, %name, error = %err, "api: cannot find repository owner");
            None
        }
    };

    let mut build = state.builds.find_number(repo.id, number).await.map_err(|err| {
        debug!(%namespace, %name, number, error = %err, "api: cannot find build");
        ApiError::from(err)
    })?;

    if let Err(err) = state
        .manager
        .cancel(&mut build, &repo, user.as_ref())
        .await
    {
        warn!(%namespace, %name, number, error = %err, "api: cannot cancel build");
        return Err(err.into());
    }

    debug!(%namespace, %name, number, "api: successfully cancelled build");
    Ok(Json(build))
}
