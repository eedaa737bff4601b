use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// One-shot timer backed by a sleeping task. Each start gets a new
/// generation; an expiry is only accepted for the current generation, so a
/// stopped or restarted timer never delivers a late fire.
#[derive(Default)]
pub(crate) struct OneShotTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
    fires_at: Option<DateTime<Utc>>,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<F>(&mut self, delay: Duration, fires_at: DateTime<Utc>, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.stop();

        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        }));
        self.fires_at = Some(fires_at);

        generation
    }

    /// Running from `start` until the expiry is taken or the timer is stopped
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn fires_at(&self) -> Option<DateTime<Utc>> {
        self.fires_at
    }

    /// Marks the timer as fired. False for a stale generation.
    pub fn take_expiry(&mut self, generation: u64) -> bool {
        if self.handle.is_none() || generation != self.generation {
            return false;
        }

        self.handle = None;
        self.fires_at = None;
        true
    }

    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                self.fires_at = None;
                self.generation += 1;
                true
            }
            None => false,
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
