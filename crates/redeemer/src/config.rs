use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, ensure};
use confirmations_net::{Config as NetworkConfig, Environment};
use redemption_sdk::{RedemptionConfig, WalletInfo};

pub const DEFAULT_STATE_PATH: &str = "~/.config/redeemer/state.json";
pub const DEFAULT_RETRIGGER_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct RedeemerConfig {
    pub wallet: WalletInfo,
    pub state_path: PathBuf,
    pub network: NetworkConfig,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    /// How often the scheduler is poked in case it went idle
    pub retrigger_interval: Duration,
}

impl RedeemerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let payment_id = lookup("PAYMENT_ID").ok_or_else(|| anyhow!("PAYMENT_ID is not set"))?;
        let recovery_seed =
            lookup("RECOVERY_SEED").ok_or_else(|| anyhow!("RECOVERY_SEED is not set"))?;
        let wallet = WalletInfo::new(payment_id, recovery_seed);
        ensure!(
            wallet.is_valid(),
            "Invalid wallet: RECOVERY_SEED must be a base64 32-byte seed"
        );

        let state_path = lookup("STATE_PATH").unwrap_or_else(|| DEFAULT_STATE_PATH.to_string());
        let state_path = PathBuf::from(shellexpand::tilde(&state_path).to_string());

        let environment = match lookup("ENVIRONMENT") {
            Some(value) => Environment::from_str(&value).map_err(|e| anyhow!(e))?,
            None => Environment::default(),
        };
        let mut network = NetworkConfig::default().with_environment(environment);
        if let Some(url) = lookup("SERVER_URL") {
            network = network.with_server_url(url);
        }
        if let Some(addr) = lookup("TOR_SOCKS_ADDR") {
            network = network.with_socks_addr(addr);
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            network = network.with_timeout(secs);
        }

        let debug = lookup("REDEEMER_DEBUG")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let retrigger_interval = lookup("RETRIGGER_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .unwrap_or(DEFAULT_RETRIGGER_INTERVAL_SECS);

        Ok(Self {
            wallet,
            state_path,
            network,
            debug,
            host,
            port,
            retrigger_interval: Duration::from_secs(retrigger_interval),
        })
    }

    pub fn redemption_config(&self) -> RedemptionConfig {
        RedemptionConfig::default().with_debug(self.debug)
    }
}
