use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{prelude::*, EnvFilter};

use slack_relay::{api, config::RelayConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let config = RelayConfig::from_env().context("Invalid relay configuration")?;

    // Always log to stdout, optionally add the tokio console in dev mode
    if config.dev_mode {
        let console_layer = console_subscriber::ConsoleLayer::builder()
            .server_addr(([127, 0, 0, 1], 6669))
            .spawn();

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
                ),
            )
            .with(console_layer)
            .init();

        tracing::info!("Tokio console enabled (connect with: tokio-console)");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
            )
            .init();
    }

    tracing::info!(?config, "Loaded relay configuration");

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::from_config(config)?);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Slack relay listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
