mod config;

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let server_config = ServerConfig::from_args(std::env::args().nth(1))?;
    let app_config = server_config.config;
    info!(
        config_path = ?server_config.config_path,
        listen = %app_config.server.listen,
        services = app_config.catalog.len(),
        "starting slotgate"
    );

    let state = slotgate_api::new_shared_state(app_config.clone())?;

    let rl = &app_config.rate_limit;
    if rl.enabled {
        state.interceptor.start_cleanup_task(
            Duration::from_secs(rl.cleanup_interval_secs),
            Duration::from_secs(rl.idle_ttl_secs),
        )?;
        info!(
            interval_secs = rl.cleanup_interval_secs,
            idle_ttl_secs = rl.idle_ttl_secs,
            "rate limiter cleanup task started"
        );
    }

    let listen = app_config.server.listen.clone();
    if let Err(e) = slotgate_api::run_server(state, &listen, shutdown_signal()).await {
        error!(error = %e, "booking API server error");
        return Err(e);
    }

    info!("slotgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
