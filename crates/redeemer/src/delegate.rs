use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use redemption_sdk::{RedemptionDelegate, UnblindedPaymentToken};
use serde::Serialize;
use tracing::{info, warn};

/// Logs scheduler events and keeps running totals for `/status`
#[derive(Default)]
pub struct LoggingDelegate {
    redeemed_tokens: AtomicU64,
    failures: AtomicU64,
    last_redeemed_at: Mutex<Option<DateTime<Utc>>>,
    next_retry_at: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RedemptionStats {
    pub redeemed_tokens: u64,
    pub failures: u64,
    pub last_redeemed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl LoggingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RedemptionStats {
        RedemptionStats {
            redeemed_tokens: self.redeemed_tokens.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_redeemed_at: self.last_redeemed_at.lock().ok().and_then(|at| *at),
            next_retry_at: self.next_retry_at.lock().ok().and_then(|at| *at),
        }
    }

    fn set(slot: &Mutex<Option<DateTime<Utc>>>, value: Option<DateTime<Utc>>) {
        if let Ok(mut slot) = slot.lock() {
            *slot = value;
        }
    }
}

impl RedemptionDelegate for LoggingDelegate {
    fn on_did_redeem_unblinded_payment_tokens(&self, tokens: &[UnblindedPaymentToken]) {
        info!("✓ Redeemed {} unblinded payment token(s)", tokens.len());
        self.redeemed_tokens
            .fetch_add(tokens.len() as u64, Ordering::Relaxed);
        Self::set(&self.last_redeemed_at, Some(Utc::now()));
        Self::set(&self.next_retry_at, None);
    }

    fn on_failed_to_redeem_unblinded_payment_tokens(&self) {
        warn!("✗ Failed to redeem unblinded payment tokens");
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_did_schedule_next_unblinded_payment_token_redemption(&self, at: DateTime<Utc>) {
        info!("Next unblinded payment token redemption at {}", at);
    }

    fn on_will_retry_redeeming_unblinded_payment_tokens(&self, at: DateTime<Utc>) {
        info!("Will retry redeeming unblinded payment tokens at {}", at);
        Self::set(&self.next_retry_at, Some(at));
    }

    fn on_did_retry_redeeming_unblinded_payment_tokens(&self) {
        info!("Retrying redeeming unblinded payment tokens");
        Self::set(&self.next_retry_at, None);
    }
}
