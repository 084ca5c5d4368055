//! Agent-facing RPC routes.
//!
//! Any transport with these semantics is admissible; this one is plain
//! JSON over HTTP with long-polling for `request` and `watch`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use conveyor_core::service::{Filter, Line, Netrc};
use conveyor_core::{Error, Stage, Step};
use conveyor_manager::Context;

use crate::error::ApiError;
use crate::state::AppState;

/// How long a `request` or `watch` call is held open before the agent is
/// asked to poll again.
const POLL_WINDOW: Duration = Duration::from_secs(30);

const WATCH_INTERVAL: Duration = Duration::from_secs(2);

pub async fn request(
    State(state): State<AppState>,
    Json(filter): Json<Filter>,
) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    let poll = state.manager.request(filter, cancel.clone());
    match tokio::time::timeout(POLL_WINDOW, poll).await {
        Ok(Ok(stage)) => Ok(Json(stage).into_response()),
        Ok(Err(Error::Cancelled)) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(Err(err)) => Err(err.into()),
        // Dropping the poll removes the parked worker; the agent retries.
        Err(_) => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuery {
    pub machine: String,
}

pub async fn accept(
    State(state): State<AppState>,
    Path(stage): Path<i64>,
    Query(query): Query<AcceptQuery>,
) -> Result<StatusCode, ApiError> {
    state.manager.accept(stage, &query.machine).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn details(
    State(state): State<AppState>,
    Path(stage): Path<i64>,
) -> Result<Json<Context>, ApiError> {
    Ok(Json(state.manager.details(stage).await?))
}

pub async fn begin_stage(
    State(state): State<AppState>,
    Path(stage): Path<i64>,
    Json(mut body): Json<Stage>,
) -> Result<Json<Stage>, ApiError> {
    body.id = stage;
    state.manager.before_all(&mut body).await?;
    Ok(Json(body))
}

pub async fn finish_stage(
    State(state): State<AppState>,
    Path(stage): Path<i64>,
    Json(mut body): Json<Stage>,
) -> Result<Json<Stage>, ApiError> {
    body.id = stage;
    state.manager.after_all(&mut body).await?;
    Ok(Json(body))
}

pub async fn begin_step(
    State(state): State<AppState>,
    Path(step): Path<i64>,
    Json(mut body): Json<Step>,
) -> Result<Json<Step>, ApiError> {
    body.id = step;
    state.manager.before(&mut body).await?;
    Ok(Json(body))
}

pub async fn finish_step(
    State(state): State<AppState>,
    Path(step): Path<i64>,
    Json(mut body): Json<Step>,
) -> Result<Json<Step>, ApiError> {
    body.id = step;
    state.manager.after(&mut body).await?;
    Ok(Json(body))
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub done: bool,
}

pub async fn watch(
    State(state): State<AppState>,
    Path(stage): Path<i64>,
) -> Result<Json<WatchResponse>, ApiError> {
    let deadline = tokio::time::Instant::now() + POLL_WINDOW;
    loop {
        if state.manager.watch(stage).await? {
            return Ok(Json(WatchResponse { done: true }));
        }
        if tokio::time::Instant::now() + WATCH_INTERVAL >= deadline {
            return Ok(Json(WatchResponse { done: false }));
        }
        tokio::time::sleep(WATCH_INTERVAL).await;
    }
}

pub async fn write_line(
    State(state): State<AppState>,
    Path(step): Path<i64>,
    Json(line): Json<Line>,
) -> Result<StatusCode, ApiError> {
    state.manager.write(step, &line).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload(
    State(state): State<AppState>,
    Path(step): Path<i64>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.manager.upload_bytes(step, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn netrc(
    State(state): State<AppState>,
    Path(repo): Path<i64>,
) -> Result<Json<Netrc>, ApiError> {
    Ok(Json(state.manager.netrc(repo).await?))
}
