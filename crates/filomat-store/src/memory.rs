use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::traits::KvArea;

/// In-memory key-value area.
///
/// Intended for tests and embedding. Entries are held behind a `RwLock` and
/// cloned on read.
pub struct InMemoryArea {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryArea {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Preload an entry, bypassing any validation.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryArea {
    fn default() -> Self {
        Self::new()
    }
}

impl KvArea for InMemoryArea {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().expect("lock poisoned").get(key).cloned())
    }

    fn put_batch(&self, entries: Vec<(String, String)>) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.extend(entries);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().expect("lock poisoned").keys().cloned().collect())
    }
}

impl std::fmt::Debug for InMemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryArea")
            .field("entry_count", &self.len())
            .finish()
    }
}
