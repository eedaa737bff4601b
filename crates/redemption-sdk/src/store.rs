use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::{RedemptionError, Result};
use crate::token::UnblindedPaymentToken;

/// Holds the client's unredeemed payment tokens. Shared between the
/// confirmation flow (adds) and the redemption scheduler (removes).
pub trait TokenStore: Send + Sync {
    fn all(&self) -> Result<Vec<UnblindedPaymentToken>>;

    /// Appends tokens, skipping any whose value is already present
    fn add(&self, tokens: &[UnblindedPaymentToken]) -> Result<()>;

    /// Removes exactly the given tokens; unknown tokens are ignored
    fn remove(&self, tokens: &[UnblindedPaymentToken]) -> Result<()>;

    fn count(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }
}

pub(crate) fn append_unique(
    existing: &mut Vec<UnblindedPaymentToken>,
    tokens: &[UnblindedPaymentToken],
) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|t| t.value.clone()).collect();
    let before = existing.len();
    for token in tokens {
        if seen.insert(token.value.clone()) {
            existing.push(token.clone());
        }
    }
    existing.len() - before
}

pub(crate) fn remove_exact(
    existing: &mut Vec<UnblindedPaymentToken>,
    tokens: &[UnblindedPaymentToken],
) -> usize {
    let doomed: HashSet<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
    let before = existing.len();
    existing.retain(|t| !doomed.contains(t.value.as_str()));
    before - existing.len()
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Vec<UnblindedPaymentToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Vec<UnblindedPaymentToken>) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.tokens.write() {
            append_unique(&mut guard, &tokens);
        }
        store
    }
}

fn poisoned<T>(_: T) -> RedemptionError {
    RedemptionError::TokenStore("token store lock poisoned".into())
}

impl TokenStore for MemoryTokenStore {
    fn all(&self) -> Result<Vec<UnblindedPaymentToken>> {
        Ok(self.tokens.read().map_err(poisoned)?.clone())
    }

    fn add(&self, tokens: &[UnblindedPaymentToken]) -> Result<()> {
        let mut existing = self.tokens.write().map_err(poisoned)?;
        append_unique(&mut existing, tokens);
        Ok(())
    }

    fn remove(&self, tokens: &[UnblindedPaymentToken]) -> Result<()> {
        let mut existing = self.tokens.write().map_err(poisoned)?;
        remove_exact(&mut existing, tokens);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.tokens.read().map_err(poisoned)?.len())
    }
}
