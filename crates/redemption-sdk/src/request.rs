/// PUT /v3/confirmation/payment/{payment_id}
///
/// Body:
/// {
///   "payload": "{\"paymentId\":\"...\"}",
///   "paymentCredentials": [
///     {"confirmationType": "view", "credential": {"signature": "...", "t": "..."}, "publicKey": "..."}
///   ],
///   ...user data
/// }
use confirmations_net::{Method, UrlRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credential::{Credential, CredentialSigner};
use crate::error::{RedemptionError, Result};
use crate::token::{ConfirmationType, UnblindedPaymentToken};
use crate::wallet::WalletInfo;

pub const CONFIRMATIONS_API_VERSION: u32 = 3;
pub const CONTENT_TYPE_JSON: &str = "application/json";

pub fn redeem_payment_tokens_path(payment_id: &str) -> String {
    format!(
        "/v{}/confirmation/payment/{}",
        CONFIRMATIONS_API_VERSION, payment_id
    )
}

/// The JSON string every credential in a redemption is signed over.
pub fn build_payment_payload(payment_id: &str) -> Result<String> {
    serde_json::to_string(&PaymentPayload {
        payment_id: payment_id.to_string(),
    })
    .map_err(|e| RedemptionError::Serialization(e.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    #[serde(rename = "paymentId")]
    pub payment_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCredential {
    pub confirmation_type: ConfirmationType,
    pub credential: Credential,
    pub public_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemPaymentTokensBody {
    /// Serialized `PaymentPayload`; credentials sign this exact string
    pub payload: String,
    pub payment_credentials: Vec<PaymentCredential>,
    #[serde(flatten)]
    pub user_data: Map<String, Value>,
}

pub struct RedeemPaymentTokensUrlRequestBuilder<'a> {
    wallet: &'a WalletInfo,
    tokens: &'a [UnblindedPaymentToken],
    user_data: Map<String, Value>,
}

impl<'a> RedeemPaymentTokensUrlRequestBuilder<'a> {
    pub fn new(
        wallet: &'a WalletInfo,
        tokens: &'a [UnblindedPaymentToken],
        user_data: Map<String, Value>,
    ) -> Self {
        Self {
            wallet,
            tokens,
            user_data,
        }
    }

    pub fn build_payload(&self) -> Result<String> {
        build_payment_payload(&self.wallet.payment_id)
    }

    pub fn build_body(&self, signer: &dyn CredentialSigner) -> Result<RedeemPaymentTokensBody> {
        let payload = self.build_payload()?;

        let payment_credentials = self
            .tokens
            .iter()
            .map(|token| -> Result<PaymentCredential> {
                Ok(PaymentCredential {
                    confirmation_type: token.confirmation_type,
                    credential: signer.sign(token, &payload)?,
                    public_key: token.public_key.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Reserved keys are never overwritten by user data
        let mut user_data = self.user_data.clone();
        user_data.remove("payload");
        user_data.remove("paymentCredentials");

        Ok(RedeemPaymentTokensBody {
            payload,
            payment_credentials,
            user_data,
        })
    }

    pub fn build(&self, signer: &dyn CredentialSigner) -> Result<UrlRequest> {
        if !self.wallet.is_valid() {
            return Err(RedemptionError::InvalidWallet);
        }

        let body = self.build_body(signer)?;
        let content = serde_json::to_string(&body)
            .map_err(|e| RedemptionError::Serialization(e.to_string()))?;

        let mut request = UrlRequest::new(
            Method::Put,
            redeem_payment_tokens_path(&self.wallet.payment_id),
        )
        .with_header("accept", CONTENT_TYPE_JSON);

        for (name, value) in self.wallet.sign_body(&content)? {
            request = request.with_header(name, value);
        }

        Ok(request.with_content(content, CONTENT_TYPE_JSON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::VerificationKeySigner;
    use crate::token::AdType;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    fn token(fill: u8, confirmation_type: ConfirmationType) -> UnblindedPaymentToken {
        UnblindedPaymentToken::new(
            STANDARD.encode([fill; 96]),
            format!("issuer-{}", fill),
            confirmation_type,
            AdType::NotificationAd,
        )
    }

    #[test]
    fn test_request_shape() {
        let wallet = WalletInfo::generate("c387c2d8-a26d-4451-83e4-5c0c6fd942be");
        let tokens = vec![
            token(1, ConfirmationType::Viewed),
            token(2, ConfirmationType::Clicked),
        ];
        let mut user_data = Map::new();
        user_data.insert("platform".into(), json!("linux"));

        let request = RedeemPaymentTokensUrlRequestBuilder::new(&wallet, &tokens, user_data)
            .build(&VerificationKeySigner)
            .unwrap();

        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.path,
            "/v3/confirmation/payment/c387c2d8-a26d-4451-83e4-5c0c6fd942be"
        );
        assert_eq!(request.content_type.as_deref(), Some(CONTENT_TYPE_JSON));
        assert_eq!(request.header("accept"), Some(CONTENT_TYPE_JSON));
        assert!(request.header("digest").unwrap().starts_with("SHA-256="));
        assert!(request
            .header("signature")
            .unwrap()
            .starts_with(r#"keyId="primary",algorithm="ed25519""#));

        let body: Value = serde_json::from_str(request.content.as_deref().unwrap()).unwrap();
        assert_eq!(
            body["payload"],
            json!(r#"{"paymentId":"c387c2d8-a26d-4451-83e4-5c0c6fd942be"}"#)
        );
        assert_eq!(body["platform"], json!("linux"));

        let credentials = body["paymentCredentials"].as_array().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0]["confirmationType"], json!("view"));
        assert_eq!(credentials[0]["publicKey"], json!("issuer-1"));
        assert_eq!(credentials[1]["confirmationType"], json!("click"));
        assert_eq!(
            credentials[1]["credential"]["t"],
            json!(STANDARD.encode([2u8; 64]))
        );
    }

    #[test]
    fn test_user_data_cannot_replace_credentials() {
        let wallet = WalletInfo::generate("payment");
        let tokens = vec![token(1, ConfirmationType::Viewed)];
        let mut user_data = Map::new();
        user_data.insert("paymentCredentials".into(), json!([]));

        let body = RedeemPaymentTokensUrlRequestBuilder::new(&wallet, &tokens, user_data)
            .build_body(&VerificationKeySigner)
            .unwrap();
        assert_eq!(body.payment_credentials.len(), 1);
        assert!(body.user_data.is_empty());
    }

    #[test]
    fn test_malformed_token_fails_the_build() {
        let wallet = WalletInfo::generate("payment");
        let mut bad = token(1, ConfirmationType::Viewed);
        bad.value = "short".into();

        let result = RedeemPaymentTokensUrlRequestBuilder::new(&wallet, &[bad], Map::new())
            .build(&VerificationKeySigner);
        assert!(matches!(result, Err(RedemptionError::Credential(_))));
    }

    #[test]
    fn test_invalid_wallet_fails_the_build() {
        let wallet = WalletInfo::new("", "");
        let tokens = vec![token(1, ConfirmationType::Viewed)];

        let result = RedeemPaymentTokensUrlRequestBuilder::new(&wallet, &tokens, Map::new())
            .build(&VerificationKeySigner);
        assert!(matches!(result, Err(RedemptionError::InvalidWallet)));
    }
}
