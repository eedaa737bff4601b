use std::future::Future;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use confirmations_net::ConfirmationsHttpClient;
use redemption_sdk::{
    JsonStateStore, PrefStore, RedemptionScheduler, SchedulerContext, SchedulerStatus, TokenStore,
    NEXT_TOKEN_REDEMPTION_AT_PREF,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::RedeemerConfig;
use crate::delegate::{LoggingDelegate, RedemptionStats};
use crate::error::Result;

pub struct RedeemerState {
    pub config: RedeemerConfig,
    pub store: Arc<JsonStateStore>,
    pub scheduler: RedemptionScheduler,
    pub delegate: Arc<LoggingDelegate>,
}

impl RedeemerState {
    /// Opens the state file and starts the scheduler. Must run inside the runtime.
    pub fn new(config: RedeemerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(JsonStateStore::open(&config.state_path)?);
        let network = ConfirmationsHttpClient::new(config.network.clone())?;
        info!("Confirmations server: {}", network.config().base_url());

        let context = SchedulerContext::new(
            config.redemption_config(),
            store.clone(),
            store.clone(),
            Arc::new(network),
        );
        let scheduler = RedemptionScheduler::spawn(context);

        let delegate = Arc::new(LoggingDelegate::new());
        scheduler.set_delegate(&delegate);

        Ok(Self {
            config,
            store,
            scheduler,
            delegate,
        })
    }

    /// No-op while a redemption is scheduled, retrying or in flight
    pub fn trigger(&self) {
        self.scheduler
            .maybe_redeem_after_delay(self.config.wallet.clone());
    }
}

pub fn router(state: Arc<RedeemerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run<F>(state: Arc<RedeemerState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Redeemer listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct StatusResponse {
    payment_id: String,
    unblinded_payment_tokens: usize,
    next_token_redemption_at: Option<DateTime<Utc>>,
    scheduler: SchedulerStatus,
    stats: RedemptionStats,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<Arc<RedeemerState>>) -> Result<Json<StatusResponse>> {
    let scheduler = state.scheduler.status().await?;

    Ok(Json(StatusResponse {
        payment_id: state.config.wallet.payment_id.clone(),
        unblinded_payment_tokens: state.store.count()?,
        next_token_redemption_at: state.store.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF)?,
        scheduler,
        stats: state.delegate.stats(),
    }))
}
