use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedemptionError>;

#[derive(Error, Debug)]
pub enum RedemptionError {
    #[error("Invalid wallet")]
    InvalidWallet,

    #[error("Network error: {0}")]
    Network(#[from] confirmations_net::NetworkError),

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Pref store error: {0}")]
    PrefStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Scheduler is no longer running")]
    SchedulerStopped,

    #[error("No unblinded payment token could be signed")]
    NoRedeemableTokens,
}

impl RedemptionError {
    /// Whether the same redemption attempt can succeed if tried again later.
    /// Request building failures are deterministic for a given input.
    pub fn should_retry(&self) -> bool {
        match self {
            RedemptionError::Network(_)
            | RedemptionError::UnexpectedStatus(_)
            | RedemptionError::TokenStore(_) => true,
            RedemptionError::InvalidWallet
            | RedemptionError::Credential(_)
            | RedemptionError::Signing(_)
            | RedemptionError::PrefStore(_)
            | RedemptionError::Serialization(_)
            | RedemptionError::SchedulerStopped
            | RedemptionError::NoRedeemableTokens => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(RedemptionError::UnexpectedStatus(500).should_retry());
        assert!(RedemptionError::Network(confirmations_net::NetworkError::Timeout(
            "slow".into()
        ))
        .should_retry());
        assert!(!RedemptionError::Credential("bad token".into()).should_retry());
        assert!(!RedemptionError::InvalidWallet.should_retry());
        assert!(!RedemptionError::NoRedeemableTokens.should_retry());
        assert!(RedemptionError::TokenStore("locked".into()).should_retry());
    }
}
