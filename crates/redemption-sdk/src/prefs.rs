use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{RedemptionError, Result};

pub const NEXT_TOKEN_REDEMPTION_AT_PREF: &str = "next_token_redemption_at";

/// Persisted key-value state the scheduler reads and writes
pub trait PrefStore: Send + Sync {
    fn get_time(&self, key: &str) -> Result<Option<DateTime<Utc>>>;
    fn set_time(&self, key: &str, value: DateTime<Utc>) -> Result<()>;
    fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryPrefStore {
    times: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryPrefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RedemptionError {
    RedemptionError::PrefStore("pref store lock poisoned".into())
}

impl PrefStore for MemoryPrefStore {
    fn get_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.times.lock().map_err(poisoned)?.get(key).copied())
    }

    fn set_time(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
        self.times
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.times.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_set_get_clear() {
        let prefs = MemoryPrefStore::new();
        assert_eq!(prefs.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap(), None);

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        prefs.set_time(NEXT_TOKEN_REDEMPTION_AT_PREF, at).unwrap();
        assert_eq!(prefs.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap(), Some(at));

        prefs.clear(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap();
        assert_eq!(prefs.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap(), None);
    }
}
