use std::collections::HashMap;
use std::sync::RwLock;

use crate::constants::unix_time_now;
use crate::error::Error;

/// Veto cache consulted after signature validation: a token seen before is
/// rejected even though its signature is valid.
pub trait TokenReplayCache: Send + Sync {
    /// Whether the exact serialization was accepted before.
    fn contains(&self, token: &str) -> Result<bool, Error>;

    /// Records the token until `expires_at`; returns false when it could not
    /// be recorded.
    fn try_add(&self, token: &str, expires_at: i64) -> Result<bool, Error>;
}

/// Process-local replay cache; expired entries are purged opportunistically
/// on insert.
pub struct InMemoryReplayCache {
    entries: RwLock<HashMap<String, i64>>,
}

impl InMemoryReplayCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenReplayCache for InMemoryReplayCache {
    fn contains(&self, token: &str) -> Result<bool, Error> {
        let now = unix_time_now();
        let entries = self.entries.read().expect("replay cache lock poisoned");
        Ok(entries.get(token).is_some_and(|expiry| *expiry > now))
    }

    fn try_add(&self, token: &str, expires_at: i64) -> Result<bool, Error> {
        let now = unix_time_now();
        let mut entries = self.entries.write().expect("replay cache lock poisoned");
        entries.retain(|_, expiry| *expiry > now);
        entries.insert(token.to_string(), expires_at);
        Ok(true)
    }
}
