use anyhow::Context;
use clap::Parser;
use meshcall_server::{ServerConfig, SignalingServer, shutdown_signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    info!(
        bind_addr = %config.bind_addr(),
        allowed_origin = %config.allowed_origin,
        "Starting signaling server"
    );

    let server = SignalingServer::bind(config)
        .await
        .context("failed to start signaling server")?;
    info!("Signaling server listening on http://{}", server.local_addr()?);

    server.serve(shutdown_signal()).await?;

    info!("Signaling server stopped");
    Ok(())
}
