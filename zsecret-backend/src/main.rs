//! zsecret-backend
//!
//! Wallet session and balance service for the escrow frontend.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zsecret_backend::{serve, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "zsecret_backend=debug,zsecret_session=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    for chain in &config.chains {
        tracing::info!(chain = %chain.chain_id, enabled = chain.enabled, "chain configured");
    }

    serve(&config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
