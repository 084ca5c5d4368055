//! Route definitions.

pub mod builds;
pub mod health;
pub mod rpc;
pub mod steps;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::check))
        .route("/rpc/v1/request", post(rpc::request))
        .route("/rpc/v1/stage/{stage}", get(rpc::details))
        .route("/rpc/v1/stage/{stage}/accept", post(rpc::accept))
        .route("/rpc/v1/stage/{stage}/begin", post(rpc::begin_stage))
        .route("/rpc/v1/stage/{stage}/finish", post(rpc::finish_stage))
        .route("/rpc/v1/stage/{stage}/watch", get(rpc::watch))
        .route("/rpc/v1/step/{step}/begin", post(rpc::begin_step))
        .route("/rpc/v1/step/{step}/finish", post(rpc::finish_step))
        .route("/rpc/v1/step/{step}/lines", post(rpc::write_line))
        .route("/rpc/v1/step/{step}/logs", put(rpc::upload))
        .route("/rpc/v1/netrc/{repo}", get(rpc::netrc))
        .route(
            "/api/repos/{namespace}/{name}/builds/{number}",
            get(builds::find),
        )
        .route(
            "/api/repos/{namespace}/{name}/builds/{number}/cancel",
            post(builds::cancel),
        )
        .route("/api/steps/{step}/logs", get(steps::logs))
        .with_state(state)
}
