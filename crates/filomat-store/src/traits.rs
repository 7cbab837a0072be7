use crate::error::{Diagnostic, StoreResult};

/// Persistent string key-value area backing the inventory.
///
/// Implementations must satisfy:
/// - `put_batch` is atomic: after a crash either every entry of the batch is
///   visible or none is.
/// - Reads never observe a partially applied batch.
/// - Corrupt backing data is not an error. The area starts empty and reports
///   what it discarded through [`KvArea::diagnostics`].
pub trait KvArea: Send + Sync {
    /// Read a value. Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write several entries in one atomic step.
    fn put_batch(&self, entries: Vec<(String, String)>) -> StoreResult<()>;

    /// Write a single entry.
    fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.put_batch(vec![(key.to_string(), value)])
    }

    /// All keys, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Recoveries performed when the area was opened.
    fn diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }
}
