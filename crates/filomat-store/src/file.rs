use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Diagnostic, StoreError, StoreResult};
use crate::traits::KvArea;

const FORMAT_VERSION: u32 = 1;

/// On-disk document.
///
/// ```json
/// { "format": 1, "crc32": 2868168125, "entries": { "items": "[...]" } }
/// ```
///
/// `crc32` covers the compact JSON encoding of `entries`. Keys are kept in a
/// `BTreeMap` so that encoding is deterministic.
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    format: u32,
    crc32: u32,
    entries: BTreeMap<String, String>,
}

fn checksum(entries: &BTreeMap<String, String>) -> StoreResult<u32> {
    let bytes = serde_json::to_vec(entries).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(crc32fast::hash(&bytes))
}

/// Key-value area persisted as a single checksummed JSON file.
///
/// Every batch rewrites the whole document into a temporary file in the same
/// directory and atomically renames it over the old one, so a crash leaves
/// either the previous or the new document in place. A document that fails
/// to parse or fails its checksum is discarded on open and reported as a
/// diagnostic.
pub struct FileArea {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    diagnostics: Vec<Diagnostic>,
}

impl FileArea {
    /// Open (or create) the area at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut diagnostics = Vec::new();
        let entries = match fs::read(&path) {
            Ok(bytes) => match Self::decode(&bytes) {
                Ok(entries) => entries,
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "discarding malformed store file");
                    diagnostics.push(Diagnostic::malformed(path.display().to_string(), reason));
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "store file opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            diagnostics,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(bytes: &[u8]) -> Result<BTreeMap<String, String>, String> {
        let doc: Document = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if doc.format != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", doc.format));
        }
        let computed = checksum(&doc.entries).map_err(|e| e.to_string())?;
        if computed != doc.crc32 {
            return Err(format!(
                "checksum mismatch: expected {:#010x}, computed {computed:#010x}",
                doc.crc32
            ));
        }
        Ok(doc.entries)
    }

    fn write_document(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let doc = Document {
            format: FORMAT_VERSION,
            crc32: checksum(entries)?,
            entries: entries.clone(),
        };
        let bytes =
            serde_json::to_vec_pretty(&doc).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            StoreError::Backend(format!("replacing {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}

impl KvArea for FileArea {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().expect("lock poisoned").get(key).cloned())
    }

    fn put_batch(&self, batch: Vec<(String, String)>) -> StoreResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let mut next = entries.clone();
        next.extend(batch);
        self.write_document(&next)?;
        *entries = next;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().expect("lock poisoned").keys().cloned().collect())
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }
}

impl std::fmt::Debug for FileArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileArea")
            .field("path", &self.path)
            .finish()
    }
}
