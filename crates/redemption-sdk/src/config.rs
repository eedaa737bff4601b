use std::time::Duration;

use crate::delay::{
    DEBUG_NEXT_TOKEN_REDEMPTION_AFTER, EXPIRED_NEXT_TOKEN_REDEMPTION_DELAY,
    NEXT_TOKEN_REDEMPTION_AFTER, RETRY_REDEEMING_AFTER,
};

#[derive(Clone, Debug)]
pub struct RedemptionConfig {
    /// Selects `debug_redemption_interval` instead of `redemption_interval`
    pub is_debug: bool,
    pub redemption_interval: Duration,
    pub debug_redemption_interval: Duration,
    pub retry_after: Duration,
    pub expired_redemption_delay: Duration,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            is_debug: false,
            redemption_interval: NEXT_TOKEN_REDEMPTION_AFTER,
            debug_redemption_interval: DEBUG_NEXT_TOKEN_REDEMPTION_AFTER,
            retry_after: RETRY_REDEEMING_AFTER,
            expired_redemption_delay: EXPIRED_NEXT_TOKEN_REDEMPTION_DELAY,
        }
    }
}

impl RedemptionConfig {
    pub fn with_debug(mut self, is_debug: bool) -> Self {
        self.is_debug = is_debug;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn next_redemption_interval(&self) -> Duration {
        if self.is_debug {
            self.debug_redemption_interval
        } else {
            self.redemption_interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_interval() {
        let config = RedemptionConfig::default();
        assert_eq!(config.next_redemption_interval(), Duration::from_secs(86_400));

        let config = config.with_debug(true);
        assert_eq!(config.next_redemption_interval(), Duration::from_secs(1_500));
    }
}
