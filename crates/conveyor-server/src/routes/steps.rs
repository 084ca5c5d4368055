//! Step log routes for users.

use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::error::ApiError;
use crate::state::AppState;

/// Archived logs for a completed step.
pub async fn logs(
    State(state): State<AppState>,
    Path(step): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.logs.find(step).await?;
    Ok(data)
}
