//! Shared application state.

use std::sync::Arc;

use conveyor_core::service::LogStore;
use conveyor_core::store::{BuildStore, RepoStore, UserStore};
use conveyor_manager::BuildManager;

/// Handles shared by every route handler.
#[derive(Clone)]
pub struct AppState {
    pub builds: Arc<dyn BuildStore>,
    pub logs: Arc<dyn LogStore>,
    pub manager: Arc<dyn BuildManager>,
    pub repos: Arc<dyn RepoStore>,
    pub users: Arc<dyn UserStore>,
}
