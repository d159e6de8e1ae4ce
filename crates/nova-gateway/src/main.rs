//! Nova Gateway entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_PORT=8090 cargo run -p nova-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use nova_common::{try_init_tracing_with_config, AppConfig, AppResult, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration first so the log format can follow APP_ENV
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, code = e.error_code(), "Gateway failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        address = %config.gateway.address(),
        heartbeat_interval_ms = config.heartbeat.interval_ms,
        max_missed = config.heartbeat.max_missed,
        "Starting Nova Gateway"
    );

    nova_gateway::run(config).await?;

    info!("Nova Gateway stopped");
    Ok(())
}
