use chrono::{DateTime, Utc};

use crate::token::UnblindedPaymentToken;

/// Lifecycle notifications from the redemption scheduler. Called on the
/// scheduler's task; implementations must not block.
pub trait RedemptionDelegate: Send + Sync {
    fn on_did_redeem_unblinded_payment_tokens(&self, _tokens: &[UnblindedPaymentToken]) {}

    fn on_failed_to_redeem_unblinded_payment_tokens(&self) {}

    fn on_did_schedule_next_unblinded_payment_token_redemption(&self, _at: DateTime<Utc>) {}

    fn on_will_retry_redeeming_unblinded_payment_tokens(&self, _at: DateTime<Utc>) {}

    fn on_did_retry_redeeming_unblinded_payment_tokens(&self) {}
}
