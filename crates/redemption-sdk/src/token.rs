/// Unblinded payment tokens are produced by the confirmation flow: the client
/// blinds a token, the issuer signs it, the client unblinds the signature and
/// appends the result to the token store. They sit there until redeemed.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationType {
    #[serde(rename = "view")]
    Viewed,
    #[serde(rename = "click")]
    Clicked,
    #[serde(rename = "dismiss")]
    Dismissed,
    Served,
    Landed,
    #[serde(rename = "bookmark")]
    SavedAd,
    #[serde(rename = "flag")]
    MarkAdAsInappropriate,
    #[serde(rename = "upvote")]
    LikedAd,
    #[serde(rename = "downvote")]
    DislikedAd,
    Conversion,
}

impl ConfirmationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationType::Viewed => "view",
            ConfirmationType::Clicked => "click",
            ConfirmationType::Dismissed => "dismiss",
            ConfirmationType::Served => "served",
            ConfirmationType::Landed => "landed",
            ConfirmationType::SavedAd => "bookmark",
            ConfirmationType::MarkAdAsInappropriate => "flag",
            ConfirmationType::LikedAd => "upvote",
            ConfirmationType::DislikedAd => "downvote",
            ConfirmationType::Conversion => "conversion",
        }
    }
}

impl std::fmt::Display for ConfirmationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdType {
    #[serde(rename = "ad_notification")]
    NotificationAd,
    #[serde(rename = "new_tab_page_ad")]
    NewTabPageAd,
    #[serde(rename = "promoted_content_ad")]
    PromotedContentAd,
    #[serde(rename = "inline_content_ad")]
    InlineContentAd,
    #[serde(rename = "search_result_ad")]
    SearchResultAd,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::NotificationAd => "ad_notification",
            AdType::NewTabPageAd => "new_tab_page_ad",
            AdType::PromotedContentAd => "promoted_content_ad",
            AdType::InlineContentAd => "inline_content_ad",
            AdType::SearchResultAd => "search_result_ad",
        }
    }
}

impl std::fmt::Display for AdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token ready for redemption
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnblindedPaymentToken {
    /// Generated once when the token is created, stable afterwards
    pub transaction_id: String,
    /// Base64 of the unblinded token: preimage `t` (64 bytes) || `W` (32 bytes)
    pub value: String,
    /// Issuer public key the token was signed under (base64)
    pub public_key: String,
    pub confirmation_type: ConfirmationType,
    pub ad_type: AdType,
}

impl UnblindedPaymentToken {
    pub fn new(
        value: impl Into<String>,
        public_key: impl Into<String>,
        confirmation_type: ConfirmationType,
        ad_type: AdType,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            value: value.into(),
            public_key: public_key.into(),
            confirmation_type,
            ad_type,
        }
    }
}

// Token identity is the token value; metadata does not distinguish tokens
impl PartialEq for UnblindedPaymentToken {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for UnblindedPaymentToken {}

impl std::hash::Hash for UnblindedPaymentToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}
