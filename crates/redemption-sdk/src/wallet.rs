use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RedemptionError, Result};

const SEED_LENGTH: usize = 32;

/// Payment identity used to sign redemption requests
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletInfo {
    pub payment_id: String,
    /// Base64 Ed25519 seed
    pub recovery_seed: String,
}

impl WalletInfo {
    pub fn new(payment_id: impl Into<String>, recovery_seed: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            recovery_seed: recovery_seed.into(),
        }
    }

    /// Fresh wallet with a random seed
    pub fn generate(payment_id: impl Into<String>) -> Self {
        let mut seed = [0u8; SEED_LENGTH];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::new(payment_id, STANDARD.encode(seed))
    }

    pub fn is_valid(&self) -> bool {
        !self.payment_id.is_empty() && self.seed_bytes().is_ok()
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        Ok(self.signing_key()?.verifying_key())
    }

    /// Headers proving the body was sent by this wallet:
    /// `digest: SHA-256=<b64>` and an Ed25519 `signature` over the digest line
    pub fn sign_body(&self, body: &str) -> Result<Vec<(String, String)>> {
        let digest = format!("SHA-256={}", STANDARD.encode(Sha256::digest(body.as_bytes())));
        let signed_line = format!("digest: {}", digest);
        let signature = self.signing_key()?.sign(signed_line.as_bytes());

        let signature_header = format!(
            r#"keyId="primary",algorithm="ed25519",headers="digest",signature="{}""#,
            STANDARD.encode(signature.to_bytes())
        );

        Ok(vec![
            ("digest".to_string(), digest),
            ("signature".to_string(), signature_header),
        ])
    }

    fn signing_key(&self) -> Result<SigningKey> {
        let seed = self.seed_bytes()?;
        Ok(SigningKey::from_bytes(&seed))
    }

    fn seed_bytes(&self) -> Result<[u8; SEED_LENGTH]> {
        let bytes = STANDARD
            .decode(&self.recovery_seed)
            .map_err(|e| RedemptionError::Signing(format!("Invalid recovery seed: {}", e)))?;
        bytes.try_into().map_err(|bytes: Vec<u8>| {
            RedemptionError::Signing(format!(
                "Recovery seed must be {} bytes, got {}",
                SEED_LENGTH,
                bytes.len()
            ))
        })
    }
}

impl std::fmt::Debug for WalletInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletInfo")
            .field("payment_id", &self.payment_id)
            .field("recovery_seed", &"********")
            .finish()
    }
}
