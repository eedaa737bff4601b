use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod delegate;
mod error;
mod server;

use config::RedeemerConfig;
use server::RedeemerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "redeemer=info,redemption_sdk=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting redeemer");

    dotenvy::dotenv().ok();
    let config = RedeemerConfig::from_env()?;

    info!("Payment id: {}", config.wallet.payment_id);
    info!("State file: {}", config.state_path.display());
    if config.debug {
        warn!("Debug redemption interval enabled");
    }

    let state = Arc::new(RedeemerState::new(config)?);

    // First tick fires immediately
    let trigger_state = state.clone();
    let retrigger = tokio::spawn(async move {
        let mut interval = tokio::time::interval(trigger_state.config.retrigger_interval);
        loop {
            interval.tick().await;
            trigger_state.trigger();
        }
    });

    server::run(state, shutdown_signal()).await?;
    retrigger.abort();

    info!("Redeemer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
