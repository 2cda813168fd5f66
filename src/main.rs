use anyhow::{Context, Result};
use gatekeeper::access::{ConfigStore, RoleMatrixEvaluator};
use gatekeeper::api::{create_router, AppState};
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::forward::Forwarder;
use gatekeeper::lifecycle::{LifecycleStore, RedisLifecycleStore};
use gatekeeper::reload::watch_config_files;
use gatekeeper::router::LifecycleRouter;
use gatekeeper::wake::{ComposeWaker, WakeCoordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=info,tower_http=info".into()),
        )
        .init();

    let config = GatekeeperConfig::load()?;
    let asset_id = config.server.asset_id.clone();

    // Access config: start empty (deny all) if the documents can't be read
    let paths = config.access_paths();
    let access = Arc::new(ConfigStore::default());
    if access.reload(&paths).is_err() {
        warn!("Starting without a valid access config, all users will be rejected");
    }

    let _watcher = match watch_config_files(Arc::clone(&access), paths, config.reload_debounce()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "Could not watch config files, hot reload disabled");
            None
        }
    };

    let mut router = LifecycleRouter::new(
        asset_id.clone(),
        Arc::clone(&access),
        Arc::new(RoleMatrixEvaluator),
    );

    if let Some(url) = &config.lifecycle.redis_url {
        match RedisLifecycleStore::connect(url).await {
            Ok(store) => {
                let store: Arc<dyn LifecycleStore> = Arc::new(store);
                let waker = Arc::new(ComposeWaker::new(
                    config.wake.compose_file.clone(),
                    config.wake.container_prefix.clone(),
                ));
                let wake = Arc::new(WakeCoordinator::new(
                    Arc::clone(&store),
                    waker,
                    config.wake_buffer_ttl(),
                ));
                router = router.with_lifecycle(store, wake);
            }
            Err(e) => warn!(error = %e, "Redis connection failed, lifecycle routing disabled"),
        }
    }

    let forwarder =
        Forwarder::new(config.forward_timeout()).context("Failed to build HTTP client")?;

    let state = AppState {
        router: Arc::new(router),
        forwarder,
        agent: config.agent_target(),
        tracked: config.tracked_target(),
        max_body_bytes: config.server.max_body_bytes,
    };
    info!(url = %state.agent.url, "Forwarding authorized requests to agent");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(asset_id = %asset_id, %addr, "Gatekeeper starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Gatekeeper stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
