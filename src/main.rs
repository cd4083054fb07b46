//! chat-relay server binary.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use chat_relay::config::{Cli, Config};
use chat_relay::provider::openai::OpenAiProvider;
use chat_relay::relay::StreamRelay;
use chat_relay::server::chat_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "chat_relay=debug,tower_http=debug"
    } else {
        "chat_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Arc::new(Config::from_cli(&cli)?);

    info!(
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        cors_origin = %config.server.cors_origin,
        api_key_set = config.provider.api_key.is_some(),
        "Configuration loaded"
    );

    // The key is not required here; a missing key surfaces as an in-stream error.
    let provider = Arc::new(OpenAiProvider::from_config(&config.provider));
    let relay = StreamRelay::new(provider);

    let state = Arc::new(AppState::new(relay, config.clone()));
    let app = build_router(state)?;

    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
