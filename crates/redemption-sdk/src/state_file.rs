/// Token backlog and prefs persisted together in one JSON file so they survive restarts.
/// Every mutation rewrites the file through a temp file + rename.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RedemptionError, Result};
use crate::prefs::PrefStore;
use crate::store::{append_unique, remove_exact, TokenStore};
use crate::token::UnblindedPaymentToken;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub unblinded_payment_tokens: Vec<UnblindedPaymentToken>,
    #[serde(default)]
    pub prefs: BTreeMap<String, DateTime<Utc>>,
}

pub struct JsonStateStore {
    path: PathBuf,
    state: RwLock<PersistedState>,
}

impl JsonStateStore {
    /// Loads the state file, or starts empty if it does not exist yet.
    /// A file that exists but cannot be parsed is an error; it may hold
    /// unredeemed tokens.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let state = Self::load(&path)?;
            info!(
                "Loaded {} unblinded payment token(s) from {}",
                state.unblinded_payment_tokens.len(),
                path.display()
            );
            state
        } else {
            info!("No state at {}, starting empty", path.display());
            PersistedState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Result<PersistedState> {
        Ok(self.read()?.clone())
    }

    fn load(path: &Path) -> Result<PersistedState> {
        let bytes = std::fs::read(path).map_err(|e| {
            RedemptionError::TokenStore(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RedemptionError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RedemptionError::TokenStore(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| RedemptionError::Serialization(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, bytes).map_err(|e| {
            RedemptionError::TokenStore(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            RedemptionError::TokenStore(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, PersistedState>> {
        self.state
            .read()
            .map_err(|_| RedemptionError::TokenStore("state lock poisoned".into()))
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut guard = self
            .state
            .write()
            .map_err(|_| RedemptionError::TokenStore("state lock poisoned".into()))?;

        // Mutate a copy so a failed write leaves memory and disk in agreement
        let mut next = guard.clone();
        mutate(&mut next);
        self.save(&next)?;
        *guard = next;
        Ok(())
    }
}

impl TokenStore for JsonStateStore {
    fn all(&self) -> Result<Vec<UnblindedPaymentToken>> {
        Ok(self.read()?.unblinded_payment_tokens.clone())
    }

    fn add(&self, tokens: &[UnblindedPaymentToken]) -> Result<()> {
        self.update(|state| {
            append_unique(&mut state.unblinded_payment_tokens, tokens);
        })
    }

    fn remove(&self, tokens: &[UnblindedPaymentToken]) -> Result<()> {
        self.update(|state| {
            remove_exact(&mut state.unblinded_payment_tokens, tokens);
        })
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read()?.unblinded_payment_tokens.len())
    }
}

impl PrefStore for JsonStateStore {
    fn get_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.prefs.get(key).copied())
    }

    fn set_time(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
        self.update(|state| {
            state.prefs.insert(key.to_string(), value);
        })
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.update(|state| {
            state.prefs.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::NEXT_TOKEN_REDEMPTION_AT_PREF;
    use crate::token::{AdType, ConfirmationType};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn token(value: &str) -> UnblindedPaymentToken {
        UnblindedPaymentToken::new(value, "key", ConfirmationType::Viewed, AdType::NotificationAd)
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonStateStore::open(dir.path().join("state.json")).unwrap();

        assert!(store.is_empty().unwrap());
        assert_eq!(store.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap(), None);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 3, 2, 1).unwrap();

        {
            let store = JsonStateStore::open(&path).unwrap();
            store.add(&[token("a"), token("b"), token("c")]).unwrap();
            store.remove(&[token("b")]).unwrap();
            store.set_time(NEXT_TOKEN_REDEMPTION_AT_PREF, at).unwrap();
        }

        let reopened = JsonStateStore::open(&path).unwrap();
        let tokens = reopened.all().unwrap();
        assert_eq!(tokens, vec![token("a"), token("c")]);
        assert_eq!(
            reopened.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap(),
            Some(at)
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_transaction_ids_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let original = token("a");

        JsonStateStore::open(&path)
            .unwrap()
            .add(&[original.clone()])
            .unwrap();

        let reopened = JsonStateStore::open(&path).unwrap();
        assert_eq!(
            reopened.all().unwrap()[0].transaction_id,
            original.transaction_id
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            JsonStateStore::open(&path),
            Err(RedemptionError::Serialization(_))
        ));
    }
}
