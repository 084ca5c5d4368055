//! Conveyor CI server.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use conveyor_core::service::System;
use conveyor_manager::Manager;
use conveyor_memstore::MemStore;
use conveyor_queue::Scheduler;
use conveyor_server::services::{
    FileConfigService, HttpWebhookSender, LogStatusService, StaticNetrcService,
};
use conveyor_server::{routes, AppState, Config};
use conveyor_stream::{Hub, LiveLogs, MemLogStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store = Arc::new(MemStore::new());
    let scheduler = Arc::new(Scheduler::new(store.clone()));

    // The dispatch loop is a per-process singleton; its lifetime is bound
    // to this token and ends at shutdown.
    let shutdown = CancellationToken::new();
    scheduler.spawn(shutdown.clone());

    let manager = Arc::new(Manager {
        builds: store.clone(),
        config: Arc::new(FileConfigService::new(config.config_root.clone())),
        events: Arc::new(Hub::new()),
        logs: Arc::new(MemLogStore::new()),
        streams: Arc::new(LiveLogs::new()),
        netrcs: Arc::new(StaticNetrcService),
        repos: store.clone(),
        scheduler: scheduler.clone(),
        secrets: store.clone(),
        status: Arc::new(LogStatusService),
        stages: store.clone(),
        steps: store.clone(),
        system: System {
            host: config.host.clone(),
            link: config.link.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        users: store.clone(),
        webhook: Arc::new(HttpWebhookSender::new(config.webhook_endpoints.clone())),
    });

    let state = AppState {
        builds: store.clone(),
        logs: manager.logs.clone(),
        manager: manager.clone(),
        repos: store.clone(),
        users: store.clone(),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!(addr = %config.addr, "starting server");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
