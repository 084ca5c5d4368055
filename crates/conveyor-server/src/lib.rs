//! HTTP surface for the Conveyor CI server.
//!
//! Routing stays intentionally thin: it binds the build manager to
//! transport and maps core errors onto status codes. All coordination
//! logic lives in the manager and queue crates.

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use state::AppState;
