//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Process configuration. Every knob has a sensible default so a bare
/// `conveyor-server` starts locally.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket the HTTP listener binds.
    pub addr: SocketAddr,
    /// Public host name reported to agents.
    pub host: String,
    /// Public base link reported to agents.
    pub link: String,
    /// Directory holding compiled pipeline files, one per repository slug.
    pub config_root: PathBuf,
    /// Webhook sink endpoints, comma separated.
    pub webhook_endpoints: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("CONVEYOR_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let host =
            std::env::var("CONVEYOR_HOST").unwrap_or_else(|_| "localhost:8080".to_string());
        let link =
            std::env::var("CONVEYOR_LINK").unwrap_or_else(|_| format!("http://{host}"));
        let config_root = std::env::var("CONVEYOR_CONFIG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pipelines"));
        let webhook_endpoints = std::env::var("CONVEYOR_WEBHOOK_ENDPOINTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            host,
            link,
            config_root,
            webhook_endpoints,
        }
    }
}
