mod bootstrap;
mod health;

use anyhow::Result;
use huddle_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use huddle_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the config, so load it before bootstrapping anything else
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::from_config(&app.config),
    )
    .await?;

    if !app.config.gateway.has_api_key() {
        tracing::warn!(
            event_name = "system.server.gateway_secret_missing",
            correlation_id = "bootstrap",
            "gateway api key is not configured; /schedule requests will report a configuration error"
        );
    }

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        health_port = app.config.server.health_check_port,
        "huddle-server started"
    );

    tokio::select! {
        _ = app.slack_runner.start() => {
            tracing::warn!(
                event_name = "system.server.socket_stopped",
                correlation_id = "runtime",
                "slack socket runner stopped; waiting for shutdown signal"
            );
            wait_for_shutdown().await?;
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "huddle-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
