use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{RedemptionError, Result};
use crate::token::UnblindedPaymentToken;

type HmacSha512 = Hmac<Sha512>;

pub const TOKEN_PREIMAGE_LENGTH: usize = 64;
pub const COMPRESSED_POINT_LENGTH: usize = 32;
pub const UNBLINDED_TOKEN_LENGTH: usize = TOKEN_PREIMAGE_LENGTH + COMPRESSED_POINT_LENGTH;

const DERIVE_KEY_DOMAIN: &[u8] = b"hash_derive_key";

/// Proof of token ownership bound to a specific payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Base64 MAC over the payload under the token's verification key
    pub signature: String,
    /// Base64 token preimage
    pub t: String,
}

/// Token cryptography boundary
pub trait CredentialSigner: Send + Sync {
    fn sign(&self, token: &UnblindedPaymentToken, payload: &str) -> Result<Credential>;
}

/// Verification-key signer for ristretto unblinded tokens.
///
/// key = SHA-512("hash_derive_key" || t || W), signature = HMAC-SHA-512(key, payload)
#[derive(Clone, Copy, Debug, Default)]
pub struct VerificationKeySigner;

impl VerificationKeySigner {
    pub fn derive_verification_key(preimage: &[u8], point: &[u8]) -> [u8; 64] {
        let mut hasher = Sha512::new();
        hasher.update(DERIVE_KEY_DOMAIN);
        hasher.update(preimage);
        hasher.update(point);

        let mut key = [0u8; 64];
        key.copy_from_slice(&hasher.finalize());
        key
    }
}

impl CredentialSigner for VerificationKeySigner {
    fn sign(&self, token: &UnblindedPaymentToken, payload: &str) -> Result<Credential> {
        let bytes = STANDARD.decode(&token.value).map_err(|e| {
            RedemptionError::Credential(format!(
                "Token {} is not valid base64: {}",
                token.transaction_id, e
            ))
        })?;

        if bytes.len() != UNBLINDED_TOKEN_LENGTH {
            return Err(RedemptionError::Credential(format!(
                "Token {} has {} bytes, expected {}",
                token.transaction_id,
                bytes.len(),
                UNBLINDED_TOKEN_LENGTH
            )));
        }

        let (preimage, point) = bytes.split_at(TOKEN_PREIMAGE_LENGTH);
        let key = Self::derive_verification_key(preimage, point);

        let mut mac = HmacSha512::new_from_slice(&key)
            .map_err(|e| RedemptionError::Credential(format!("HMAC init failed: {}", e)))?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(Credential {
            signature: STANDARD.encode(signature),
            t: STANDARD.encode(preimage),
        })
    }
}
