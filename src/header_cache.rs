use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use log::debug;

use crate::error::Error;

/// Process-wide cache of base64url-encoded protected headers, keyed by the
/// signing-credential fingerprint.
///
/// Racing producers may both serialize the same header; entries are
/// byte-identical, so the first insert wins and losers discard their work.
/// Entries never expire; distinct signing credentials are few in practice.
pub struct HeaderCache {
    entries: RwLock<HashMap<String, Arc<str>>>,
}

static SHARED: OnceLock<HeaderCache> = OnceLock::new();

impl HeaderCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The default instance shared by every builder in the process.
    pub fn shared() -> &'static HeaderCache {
        SHARED.get_or_init(HeaderCache::new)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("header cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_or_insert_with<F>(
        &self,
        fingerprint: &str,
        compute: F,
    ) -> Result<Arc<str>, Error>
    where
        F: FnOnce() -> Result<String, Error>,
    {
        if let Some(entry) = self
            .entries
            .read()
            .expect("header cache lock poisoned")
            .get(fingerprint)
        {
            return Ok(Arc::clone(entry));
        }

        debug!("header cache miss for fingerprint {fingerprint}");
        let encoded = compute()?;
        let mut entries = self.entries.write().expect("header cache lock poisoned");
        let entry = entries
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::from(encoded));
        Ok(Arc::clone(entry))
    }
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}
