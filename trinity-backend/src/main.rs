//! trinity-backend
//!
//! HTTP service for the Trinity verification engine.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trinity_backend::{serve, TrinityConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trinity_backend=info,trinity_consensus=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrinityConfig::from_env()?;
    tracing::info!(
        ledger = ?config.ledger_path,
        threshold = %config.threshold,
        "starting trinity-backend"
    );
    serve(config).await
}
