use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::token::{AdType, ConfirmationType, UnblindedPaymentToken};

/// Auxiliary metadata merged into the top level of the redemption body
#[async_trait]
pub trait UserDataBuilder: Send + Sync {
    async fn build(&self, tokens: &[UnblindedPaymentToken]) -> Map<String, Value>;
}

/// Platform plus per-ad-format confirmation counts:
/// `{"platform": "linux", "totals": [{"ad_format": "ad_notification", "view": "2"}]}`
#[derive(Clone, Debug)]
pub struct TotalsUserDataBuilder {
    platform: String,
}

impl Default for TotalsUserDataBuilder {
    fn default() -> Self {
        Self::new(std::env::consts::OS)
    }
}

impl TotalsUserDataBuilder {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    pub fn totals(tokens: &[UnblindedPaymentToken]) -> Value {
        let mut buckets: BTreeMap<AdType, BTreeMap<ConfirmationType, u64>> = BTreeMap::new();
        for token in tokens {
            *buckets
                .entry(token.ad_type)
                .or_default()
                .entry(token.confirmation_type)
                .or_default() += 1;
        }

        let totals = buckets
            .into_iter()
            .map(|(ad_type, counts)| {
                let mut entry = Map::new();
                entry.insert("ad_format".into(), json!(ad_type.as_str()));
                for (confirmation_type, count) in counts {
                    // Counts are strings on the wire
                    entry.insert(confirmation_type.as_str().into(), json!(count.to_string()));
                }
                Value::Object(entry)
            })
            .collect();

        Value::Array(totals)
    }
}

#[async_trait]
impl UserDataBuilder for TotalsUserDataBuilder {
    async fn build(&self, tokens: &[UnblindedPaymentToken]) -> Map<String, Value> {
        let mut user_data = Map::new();
        user_data.insert("platform".into(), json!(self.platform));
        user_data.insert("totals".into(), Self::totals(tokens));
        user_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, confirmation_type: ConfirmationType, ad_type: AdType) -> UnblindedPaymentToken {
        UnblindedPaymentToken::new(value, "key", confirmation_type, ad_type)
    }

    #[tokio::test]
    async fn test_totals_grouped_by_ad_format() {
        let tokens = vec![
            token("a", ConfirmationType::Viewed, AdType::NotificationAd),
            token("b", ConfirmationType::Viewed, AdType::NotificationAd),
            token("c", ConfirmationType::Clicked, AdType::NotificationAd),
            token("d", ConfirmationType::Viewed, AdType::NewTabPageAd),
        ];

        let user_data = TotalsUserDataBuilder::new("linux").build(&tokens).await;

        assert_eq!(
            Value::Object(user_data),
            json!({
                "platform": "linux",
                "totals": [
                    {"ad_format": "ad_notification", "view": "2", "click": "1"},
                    {"ad_format": "new_tab_page_ad", "view": "1"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_no_tokens_no_totals() {
        let user_data = TotalsUserDataBuilder::new("macos").build(&[]).await;
        assert_eq!(user_data["totals"], json!([]));
    }
}
